//! Built-in protocol reactions.
//!
//! The event loop calls [`Handler::handle`] for every parsed event before
//! forwarding it to the application. The handler may rewrite the event
//! code (CTCP detection) and enqueue immediate protocol replies; it never
//! blocks and never touches the transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ctcp::{self, CtcpKind};
use crate::event::Event;
use crate::state::{now_nanos, Shared};

/// Client version string reported in CTCP VERSION replies.
pub(crate) const VERSION: &str = concat!("ferric-", env!("CARGO_PKG_VERSION"));

/// Nickname length beyond which collision renaming prepends the underscore
/// instead of appending it.
const NICK_APPEND_LIMIT: usize = 8;

/// Classifies parsed events and runs the engine's automatic reactions.
pub(crate) struct Handler {
    pub(crate) shared: Arc<Shared>,
    pub(crate) outbound: mpsc::Sender<String>,
    pub(crate) username: String,
    pub(crate) debug: bool,
}

impl Handler {
    /// Classify `event`, mutating its code/message where needed, and
    /// enqueue any automatic replies.
    pub(crate) fn handle(&self, event: &mut Event) {
        if event.code == "PRIVMSG" && ctcp::is_ctcp(&event.message) {
            let body = ctcp::strip_delimiters(&event.message).to_string();
            event.code = CtcpKind::classify(&body).code().to_string();
            event.message = body;
        }

        if self.debug {
            debug!(code = %event.code, raw = %event.raw, "event");
        }

        match event.code.as_str() {
            "PING" => self.send_raw(format!("PONG :{}", event.message)),
            "CTCP_VERSION" => {
                self.ctcp_reply(&event.source_nick, &format!("VERSION {VERSION}"));
            }
            "CTCP_USERINFO" => {
                self.ctcp_reply(&event.source_nick, &format!("USERINFO {}", self.username));
            }
            "CTCP_CLIENTINFO" => {
                self.ctcp_reply(&event.source_nick, &format!("CLIENTINFO {}", ctcp::SUPPORTED));
            }
            "CTCP_TIME" => {
                self.ctcp_reply(
                    &event.source_nick,
                    &format!("TIME {}", chrono::Local::now().to_rfc2822()),
                );
            }
            "CTCP_PING" => self.ctcp_reply(&event.source_nick, &event.message),
            "433" | "437" => self.rename_on_collision(),
            "PONG" => {
                // The payload of our own liveness probes is a nanosecond
                // timestamp; anything else is silently ignored.
                if let Ok(sent) = event.message.parse::<i64>() {
                    let lag_ms = (now_nanos() - sent) / 1_000_000;
                    info!(lag_ms, "server round trip measured");
                }
            }
            "NICK" => {
                let mut nick = self.shared.nick.lock();
                if event.source_nick == nick.current {
                    nick.current = event.message.clone();
                }
            }
            "001" => {
                // The server may have altered the requested nickname during
                // registration; arguments[0] is authoritative.
                if let Some(confirmed) = event.arguments.first() {
                    self.shared.nick.lock().current = confirmed.clone();
                }
            }
            _ => {}
        }
    }

    /// Pick a new nickname after a collision numeric and ask the server for
    /// it.
    fn rename_on_collision(&self) {
        let renamed = {
            let mut nick = self.shared.nick.lock();
            if nick.current.len() > NICK_APPEND_LIMIT {
                nick.current.insert(0, '_');
            } else {
                nick.current.push('_');
            }
            nick.current.clone()
        };
        info!(nick = %renamed, "nickname in use, renaming");
        self.send_raw(format!("NICK {renamed}"));
    }

    fn ctcp_reply(&self, target: &str, body: &str) {
        self.send_raw(format!("NOTICE {} :{}", target, ctcp::wrap(body)));
    }

    /// Enqueue one raw line. Reactions must not block, so a full queue
    /// drops the line with a warning.
    fn send_raw(&self, line: String) {
        if let Err(e) = self.outbound.try_send(format!("{line}\r\n")) {
            warn!(error = %e, "outbound queue full, dropping reaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(queue: usize) -> (Handler, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue);
        let handler = Handler {
            shared: Arc::new(Shared::new("bot")),
            outbound: tx,
            username: "botuser".to_string(),
            debug: false,
        };
        (handler, rx)
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse("PING :12345");

        handler.handle(&mut event);

        assert_eq!(rx.try_recv().unwrap(), "PONG :12345\r\n");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ctcp_version_reclassified_and_answered() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse(":alice!a@h PRIVMSG bot :\x01VERSION\x01");

        handler.handle(&mut event);

        assert_eq!(event.code, "CTCP_VERSION");
        assert_eq!(event.message, "VERSION");
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply, format!("NOTICE alice :\x01VERSION {VERSION}\x01\r\n"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ctcp_ping_echoes_payload() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse(":alice!a@h PRIVMSG bot :\x01PING 987654\x01");

        handler.handle(&mut event);

        assert_eq!(event.code, "CTCP_PING");
        assert_eq!(rx.try_recv().unwrap(), "NOTICE alice :\x01PING 987654\x01\r\n");
    }

    #[test]
    fn test_ctcp_userinfo_and_clientinfo() {
        let (handler, mut rx) = handler(4);

        let mut event = Event::parse(":alice!a@h PRIVMSG bot :\x01USERINFO\x01");
        handler.handle(&mut event);
        assert_eq!(rx.try_recv().unwrap(), "NOTICE alice :\x01USERINFO botuser\x01\r\n");

        let mut event = Event::parse(":alice!a@h PRIVMSG bot :\x01CLIENTINFO\x01");
        handler.handle(&mut event);
        assert_eq!(
            rx.try_recv().unwrap(),
            "NOTICE alice :\x01CLIENTINFO PING VERSION TIME USERINFO CLIENTINFO\x01\r\n"
        );
    }

    #[test]
    fn test_unknown_ctcp_keeps_generic_code() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse(":alice!a@h PRIVMSG bot :\x01DANCE\x01");

        handler.handle(&mut event);

        assert_eq!(event.code, "CTCP");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_collision_appends_then_prepends() {
        let (handler, mut rx) = handler(16);

        for expected in ["bot_", "bot__", "bot___", "bot____", "bot_____", "bot______"] {
            let mut event = Event::parse(":srv 433 * bot :Nickname is already in use");
            handler.handle(&mut event);
            assert_eq!(handler.shared.current_nick(), expected);
            assert_eq!(rx.try_recv().unwrap(), format!("NICK {expected}\r\n"));
        }

        // "bot______" is nine characters: the next collision prepends.
        let mut event = Event::parse(":srv 433 * bot :Nickname is already in use");
        handler.handle(&mut event);
        assert_eq!(handler.shared.current_nick(), "_bot______");
    }

    #[test]
    fn test_channel_collision_numeric_renames_too() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse(":srv 437 * bot :Nick/channel is temporarily unavailable");

        handler.handle(&mut event);

        assert_eq!(handler.shared.current_nick(), "bot_");
        assert_eq!(rx.try_recv().unwrap(), "NICK bot_\r\n");
    }

    #[test]
    fn test_welcome_captures_confirmed_nick() {
        let (handler, _rx) = handler(4);
        let mut event = Event::parse(":srv 001 bot2 :Welcome to the network");

        handler.handle(&mut event);

        assert_eq!(handler.shared.current_nick(), "bot2");
    }

    #[test]
    fn test_nick_change_tracks_our_rename() {
        let (handler, _rx) = handler(4);

        let mut event = Event::parse(":bot!u@h NICK :robot");
        handler.handle(&mut event);
        assert_eq!(handler.shared.current_nick(), "robot");

        // Someone else renaming does not touch our state.
        let mut event = Event::parse(":alice!a@h NICK :alicia");
        handler.handle(&mut event);
        assert_eq!(handler.shared.current_nick(), "robot");
    }

    #[test]
    fn test_pong_with_garbage_payload_is_silent() {
        let (handler, mut rx) = handler(4);
        let mut event = Event::parse(":srv PONG srv :not-a-number");

        handler.handle(&mut event);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_reaction() {
        let (handler, _rx) = handler(1);
        let mut first = Event::parse("PING :a");
        let mut second = Event::parse("PING :b");

        handler.handle(&mut first);
        handler.handle(&mut second); // queue full, dropped with a warning
    }
}
