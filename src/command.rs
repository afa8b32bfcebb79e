//! Convenience command builders.
//!
//! A thin formatting layer over [`Client::send_raw`]: each method appends
//! one fully formatted protocol line to the outbound queue, which the
//! frame writer delivers in order.

use crate::client::Client;
use crate::error::EngineError;

impl Client {
    /// Join a channel.
    pub async fn join(&self, channel: &str) -> Result<(), EngineError> {
        self.send_raw(format!("JOIN {channel}")).await
    }

    /// Leave a channel, with an optional parting message.
    pub async fn part(&self, channel: &str, message: Option<&str>) -> Result<(), EngineError> {
        match message {
            Some(text) if !text.is_empty() => {
                self.send_raw(format!("PART {channel} :{text}")).await
            }
            _ => self.send_raw(format!("PART {channel}")).await,
        }
    }

    /// Ask who is on a channel.
    pub async fn names(&self, channel: &str) -> Result<(), EngineError> {
        self.send_raw(format!("NAMES {channel}")).await
    }

    /// Send a message to a nick or channel.
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), EngineError> {
        self.send_raw(format!("PRIVMSG {target} :{text}")).await
    }

    /// Send a notice to a nick or channel.
    pub async fn notice(&self, target: &str, text: &str) -> Result<(), EngineError> {
        self.send_raw(format!("NOTICE {target} :{text}")).await
    }
}
