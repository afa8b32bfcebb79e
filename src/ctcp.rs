//! CTCP (Client-to-Client Protocol) handling.
//!
//! CTCP embeds sub-messages inside PRIVMSG/NOTICE bodies, delimited by the
//! `\x01` byte. The engine reclassifies CTCP-carrying PRIVMSGs into
//! verb-specific event codes and answers the common queries itself.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// Verbs the engine answers automatically, as advertised in CLIENTINFO
/// replies.
pub const SUPPORTED: &str = "PING VERSION TIME USERINFO CLIENTINFO";

/// CTCP query verbs the engine recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CtcpKind {
    /// VERSION - requests client version information.
    Version,
    /// TIME - requests local time from the client.
    Time,
    /// PING - measures round-trip latency (matched by prefix, it carries a
    /// payload).
    Ping,
    /// USERINFO - requests user-defined information.
    Userinfo,
    /// CLIENTINFO - requests the list of supported CTCP verbs.
    Clientinfo,
    /// Any verb the engine does not answer itself.
    Unknown,
}

impl CtcpKind {
    /// Classify a stripped CTCP body.
    pub fn classify(body: &str) -> Self {
        match body {
            "VERSION" => Self::Version,
            "TIME" => Self::Time,
            "USERINFO" => Self::Userinfo,
            "CLIENTINFO" => Self::Clientinfo,
            _ if body.starts_with("PING") => Self::Ping,
            _ => Self::Unknown,
        }
    }

    /// The event code assigned to this verb.
    pub fn code(self) -> &'static str {
        match self {
            Self::Version => "CTCP_VERSION",
            Self::Time => "CTCP_TIME",
            Self::Ping => "CTCP_PING",
            Self::Userinfo => "CTCP_USERINFO",
            Self::Clientinfo => "CTCP_CLIENTINFO",
            Self::Unknown => "CTCP",
        }
    }
}

/// Check whether a PRIVMSG body carries a CTCP message.
#[inline]
pub fn is_ctcp(body: &str) -> bool {
    body.starts_with(CTCP_DELIM)
}

/// Strip the leading delimiter and everything from the last delimiter on.
///
/// Bodies missing the trailing delimiter degrade to the remaining slice
/// rather than failing.
pub fn strip_delimiters(body: &str) -> &str {
    let body = body.strip_prefix(CTCP_DELIM).unwrap_or(body);
    match body.rfind(CTCP_DELIM) {
        Some(end) => &body[..end],
        None => body,
    }
}

/// Wrap a request or reply body in CTCP delimiters.
pub fn wrap(text: &str) -> String {
    format!("{CTCP_DELIM}{text}{CTCP_DELIM}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_verbs() {
        assert_eq!(CtcpKind::classify("VERSION"), CtcpKind::Version);
        assert_eq!(CtcpKind::classify("TIME"), CtcpKind::Time);
        assert_eq!(CtcpKind::classify("USERINFO"), CtcpKind::Userinfo);
        assert_eq!(CtcpKind::classify("CLIENTINFO"), CtcpKind::Clientinfo);
    }

    #[test]
    fn test_classify_ping_by_prefix() {
        assert_eq!(CtcpKind::classify("PING 1234567890"), CtcpKind::Ping);
        assert_eq!(CtcpKind::classify("PING"), CtcpKind::Ping);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(CtcpKind::classify("ACTION waves"), CtcpKind::Unknown);
        assert_eq!(CtcpKind::classify(""), CtcpKind::Unknown);
        // Exact match only: a payload makes VERSION unknown.
        assert_eq!(CtcpKind::classify("VERSION 1.2"), CtcpKind::Unknown);
    }

    #[test]
    fn test_codes() {
        assert_eq!(CtcpKind::Version.code(), "CTCP_VERSION");
        assert_eq!(CtcpKind::Time.code(), "CTCP_TIME");
        assert_eq!(CtcpKind::Ping.code(), "CTCP_PING");
        assert_eq!(CtcpKind::Userinfo.code(), "CTCP_USERINFO");
        assert_eq!(CtcpKind::Clientinfo.code(), "CTCP_CLIENTINFO");
        assert_eq!(CtcpKind::Unknown.code(), "CTCP");
    }

    #[test]
    fn test_is_ctcp() {
        assert!(is_ctcp("\x01VERSION\x01"));
        assert!(!is_ctcp("hello world"));
        assert!(!is_ctcp(""));
    }

    #[test]
    fn test_strip_delimiters() {
        assert_eq!(strip_delimiters("\x01VERSION\x01"), "VERSION");
        assert_eq!(strip_delimiters("\x01PING 123\x01"), "PING 123");
    }

    #[test]
    fn test_strip_missing_trailing_delimiter() {
        // Some clients omit the trailing delimiter.
        assert_eq!(strip_delimiters("\x01ACTION waves"), "ACTION waves");
    }

    #[test]
    fn test_strip_degenerate_bodies() {
        assert_eq!(strip_delimiters("\x01\x01"), "");
        assert_eq!(strip_delimiters("\x01"), "");
        assert_eq!(strip_delimiters(""), "");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("VERSION ferric-0.1.0"), "\x01VERSION ferric-0.1.0\x01");
    }

    #[test]
    fn test_wrap_strip_roundtrip() {
        assert_eq!(strip_delimiters(&wrap("PING 42")), "PING 42");
    }
}
