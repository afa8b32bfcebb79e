//! # ferric
//!
//! An async IRC client engine built on tokio.
//!
//! ferric owns a single connection to an IRC server: it frames and parses
//! the line-based wire protocol, classifies inbound messages into typed
//! [`Event`]s, answers protocol housekeeping (PING/PONG, CTCP queries,
//! nickname collisions) on its own, and transparently reconnects when the
//! transport fails. The application consumes an ordered event stream and
//! issues commands through a cloneable handle; interpretation of channel
//! and user semantics is left entirely to the caller.
//!
//! ## Quick start
//!
//! ```no_run
//! use ferric::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferric::EngineError> {
//!     let config = Config::new("irc.libera.chat:6667", "ferris", "ferris");
//!     let (client, mut events) = Client::start(config).await?;
//!
//!     client.join("#rust").await?;
//!     while let Some(event) = events.recv().await {
//!         if event.code == ferric::event::STOPPED {
//!             break;
//!         }
//!         println!("{} {}", event.code, event.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Each connection epoch runs three tasks — a frame reader, a frame writer
//! and a keepalive monitor — coordinated through bounded channels and a
//! cancellation token. A single event-loop task classifies inbound events,
//! forwards them to the application, and owns the reconnect decision, so
//! protocol reactions and reconnection never race. Shutdown joins every
//! task before the transport is considered gone; no two transports are
//! ever live at once.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod ctcp;
pub mod error;
pub mod event;

mod client;
mod command;
mod handler;
mod state;
mod transport;

pub use self::client::{Client, ImmediateReconnect, ReconnectPolicy};
pub use self::codec::IrcCodec;
pub use self::config::{Config, ConfigError};
pub use self::error::EngineError;
pub use self::event::Event;
