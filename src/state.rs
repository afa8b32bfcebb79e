//! Shared connection state.
//!
//! A small record read by the keepalive monitor and written only by the
//! event loop (through the handler). Keepalive tolerates stale reads;
//! staleness only nudges probe timing, never correctness.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

/// Nickname bookkeeping: what we want vs. what the server lets us hold.
#[derive(Clone, Debug)]
pub(crate) struct NickState {
    /// The configured nickname, recaptured when lost.
    pub(crate) wanted: String,
    /// The nickname currently held (diverges after collision renaming).
    pub(crate) current: String,
}

/// State shared between the event loop (sole writer) and the keepalive
/// monitor.
pub(crate) struct Shared {
    pub(crate) nick: Mutex<NickState>,
    /// Unix nanos of the last message received from the server.
    last_seen: AtomicI64,
}

impl Shared {
    pub(crate) fn new(nick: &str) -> Self {
        Self {
            nick: Mutex::new(NickState {
                wanted: nick.to_string(),
                current: nick.to_string(),
            }),
            last_seen: AtomicI64::new(now_nanos()),
        }
    }

    /// Record that a message just arrived from the server.
    pub(crate) fn touch(&self) {
        self.last_seen.store(now_nanos(), Ordering::Relaxed);
    }

    /// Nanoseconds of server silence so far.
    pub(crate) fn nanos_since_last_seen(&self) -> i64 {
        now_nanos() - self.last_seen.load(Ordering::Relaxed)
    }

    /// Snapshot of the currently-held nickname.
    pub(crate) fn current_nick(&self) -> String {
        self.nick.lock().current.clone()
    }

    /// Snapshot of (wanted, current) nicknames.
    pub(crate) fn nick_snapshot(&self) -> (String, String) {
        let nick = self.nick.lock();
        (nick.wanted.clone(), nick.current.clone())
    }
}

/// Wall-clock nanoseconds; used as PING payloads so the echoed PONG yields
/// round-trip latency.
pub(crate) fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_resets_silence() {
        let shared = Shared::new("bot");
        shared.touch();
        // A fresh touch leaves well under a second of measured silence.
        assert!(shared.nanos_since_last_seen() < 1_000_000_000);
    }

    #[test]
    fn test_nick_snapshot() {
        let shared = Shared::new("bot");
        shared.nick.lock().current = "bot_".to_string();
        let (wanted, current) = shared.nick_snapshot();
        assert_eq!(wanted, "bot");
        assert_eq!(current, "bot_");
        assert_eq!(shared.current_nick(), "bot_");
    }
}
