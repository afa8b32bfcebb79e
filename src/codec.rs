//! Line-based wire codec.
//!
//! Splits the inbound byte stream into newline-terminated lines with the
//! standard 512-byte cap, strips the terminator and parses each line into
//! an [`Event`]. Outbound lines are written verbatim; every producer
//! enqueues fully formatted, CRLF-terminated lines.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::event::Event;

/// Maximum IRC line length, terminator included (RFC 1459 client cap).
pub const MAX_LINE_LEN: usize = 512;

/// Codec decoding inbound lines into [`Event`]s and writing outbound
/// pre-formatted lines.
pub struct IrcCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
}

impl IrcCodec {
    /// Create a codec with the standard 512-byte line cap.
    pub fn new() -> Self {
        Self { next_index: 0 }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = Event;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>, ProtocolError> {
        // Look for a newline starting from where the previous call left off.
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > MAX_LINE_LEN {
                return Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: MAX_LINE_LEN,
                });
            }

            // Servers are expected to send UTF-8; anything else is replaced
            // rather than treated as fatal.
            let text = String::from_utf8_lossy(&line);
            // A lone '\n' is tolerated even though the protocol mandates
            // "\r\n"; content is never corrupted by terminator stripping.
            let stripped = text
                .strip_suffix("\r\n")
                .or_else(|| text.strip_suffix('\n'))
                .unwrap_or(&text);

            Ok(Some(Event::parse(stripped)))
        } else {
            self.next_index = src.len();

            // A partial line already over the cap will never become valid.
            if src.len() > MAX_LINE_LEN {
                return Err(ProtocolError::LineTooLong {
                    actual: src.len(),
                    limit: MAX_LINE_LEN,
                });
            }

            Ok(None)
        }
    }
}

impl Encoder<String> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(line.as_bytes());
        Ok(())
    }
}
