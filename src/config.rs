//! Client configuration.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Config file was not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration.
///
/// All fields are public so a config can be built in code; [`Config::load`]
/// reads the same shape from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server address as `host:port` (e.g. "irc.libera.chat:6697").
    pub server: String,
    /// Nickname to request, and to recapture if lost to a collision.
    pub nick: String,
    /// Username sent in the USER registration line and in CTCP USERINFO
    /// replies.
    pub username: String,
    /// Optional server password (sent as PASS during registration).
    #[serde(default)]
    pub password: Option<String>,
    /// Connect with TLS.
    #[serde(default)]
    pub tls: bool,
    /// Verify the server certificate against the system root store.
    /// Disable only for self-signed test servers.
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    /// Log every classified event at debug level.
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Build a config with defaults: plain TCP, no password, certificate
    /// verification on.
    pub fn new(
        server: impl Into<String>,
        nick: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            nick: nick.into(),
            username: username.into(),
            password: None,
            tls: false,
            tls_verify: true,
            debug: false,
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal() {
        let config: Config = toml::from_str(
            r#"
            server = "irc.example.net:6667"
            nick = "bot"
            username = "bot"
            "#,
        )
        .unwrap();
        assert_eq!(config.server, "irc.example.net:6667");
        assert_eq!(config.nick, "bot");
        assert!(!config.tls);
        assert!(config.tls_verify);
        assert!(config.password.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_full() {
        let config: Config = toml::from_str(
            r#"
            server = "irc.example.net:6697"
            nick = "bot"
            username = "botuser"
            password = "hunter2"
            tls = true
            tls_verify = false
            debug = true
            "#,
        )
        .unwrap();
        assert!(config.tls);
        assert!(!config.tls_verify);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert!(config.debug);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server = \"irc.example.net:6667\"\nnick = \"bot\"\nusername = \"bot\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.nick, "bot");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/ferric.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
