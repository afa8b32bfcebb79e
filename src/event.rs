//! Parsed protocol events.
//!
//! One [`Event`] represents a single IRC wire message, already split into
//! command code, source, middle parameters and trailing text. The engine
//! also emits synthetic events (e.g. [`STOPPED`]) that never appeared on
//! the wire.

use tracing::debug;

/// Code of the terminal event delivered after the engine is stopped.
pub const STOPPED: &str = "FERRIC_STOPPED";

/// One parsed protocol message, or a synthetic engine event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    /// Uppercased command name or three-digit numeric reply (e.g.
    /// `"PRIVMSG"`, `"001"`), or a synthesized code such as
    /// `"CTCP_VERSION"`. Empty only for lines that violate the protocol
    /// grammar.
    pub code: String,
    /// Trailing parameter (the part after the first `" :"` delimiter),
    /// empty if absent.
    pub message: String,
    /// The original line as received, terminator stripped. Kept for
    /// diagnostics regardless of how parsing went.
    pub raw: String,
    /// Full source prefix without the leading `:`, empty when the line had
    /// no prefix.
    pub source: String,
    /// Nick component of a `nick!user@host` prefix, empty when the prefix
    /// was absent or not of that shape.
    pub source_nick: String,
    /// User component of a `nick!user@host` prefix.
    pub source_user: String,
    /// Host component of a `nick!user@host` prefix.
    pub source_host: String,
    /// Middle parameters, in order. May be empty.
    pub arguments: Vec<String>,
}

impl Event {
    /// Parse one wire line (terminator already stripped) into an event.
    ///
    /// Parsing never fails: a line that violates the protocol grammar
    /// (empty, or a `:`-prefix with no command after it) degrades to an
    /// event carrying only `raw` with an empty `code`, and a diagnostic is
    /// logged.
    ///
    /// ```
    /// use ferric::Event;
    ///
    /// let event = Event::parse(":alice!ali@example.net PRIVMSG #rust :hello");
    /// assert_eq!(event.code, "PRIVMSG");
    /// assert_eq!(event.source_nick, "alice");
    /// assert_eq!(event.arguments, vec!["#rust"]);
    /// assert_eq!(event.message, "hello");
    /// ```
    pub fn parse(line: &str) -> Self {
        let mut event = Self {
            raw: line.to_string(),
            ..Self::default()
        };

        let mut rest = line;
        if let Some(prefixed) = rest.strip_prefix(':') {
            match prefixed.split_once(' ') {
                Some((prefix, remainder)) => {
                    event.source = prefix.to_string();
                    if let Some((nick, user, host)) = split_userhost(prefix) {
                        event.source_nick = nick.to_string();
                        event.source_user = user.to_string();
                        event.source_host = host.to_string();
                    } else if prefix.contains('!') || prefix.contains('@') {
                        debug!(prefix = %prefix, "source prefix is not nick!user@host");
                    }
                    rest = remainder;
                }
                None => {
                    debug!(line = %line, "malformed line from server: prefix without command");
                    return event;
                }
            }
        }

        let (args_text, trailing) = match rest.split_once(" :") {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };
        if let Some(trailing) = trailing {
            event.message = trailing.to_string();
        }

        let mut tokens = args_text.split(' ').filter(|t| !t.is_empty());
        match tokens.next() {
            Some(code) => event.code = code.to_ascii_uppercase(),
            None => debug!(line = %line, "line carries no command"),
        }
        event.arguments = tokens.map(str::to_string).collect();

        event
    }

    /// The terminal event delivered once after [`Client::stop`].
    ///
    /// [`Client::stop`]: crate::Client::stop
    pub(crate) fn stopped() -> Self {
        Self {
            code: STOPPED.to_string(),
            ..Self::default()
        }
    }
}

/// Decompose a `nick!user@host` prefix. Returns `None` for any other shape
/// (e.g. a bare server name).
fn split_userhost(prefix: &str) -> Option<(&str, &str, &str)> {
    let (nick, rest) = prefix.split_once('!')?;
    let (user, host) = rest.split_once('@')?;
    Some((nick, user, host))
}
