//! Error types for the client engine.
//!
//! Framing-level failures live in [`ProtocolError`]; everything the engine
//! reports across task boundaries (and the single caller-visible connect
//! failure) is an [`EngineError`].

use thiserror::Error;

/// Convenience type alias for Results using [`EngineError`].
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors raised by the wire codec while framing lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded the maximum allowed length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },
}

/// Engine-level errors: dialing, transport failure, shutdown.
///
/// Transport errors are reported once on the engine's internal error
/// channel and answered with a reconnect; the only error a caller ever
/// receives directly is the initial connect failure from
/// [`Client::start`](crate::Client::start).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// I/O error while dialing or on an established transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The wire codec failed while reading or writing.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hostname could not be used as a TLS server name.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The engine has stopped; no further commands can be sent.
    #[error("engine stopped")]
    Stopped,
}
