//! Session configuration.
//!
//! Loaded from a TOML file; every field has a default, so an empty file
//! (or no file at all) yields the standard group `239.0.1.2:20480`.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_core::{ResyncSchedule, DEFAULT_MEMBER_TTL_TICKS, DEFAULT_RESYNC_INTERVAL};
use serde::{Deserialize, Serialize};

use crate::transport::MulticastOptions;

/// Default multicast group.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 0, 1, 2);

/// Default group port.
pub const DEFAULT_PORT: u16 = 20480;

/// Network and timing settings for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Multicast group address (default: 239.0.1.2).
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    /// Group port (default: 20480).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to join the group on (default: 0.0.0.0, any).
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
    /// Multicast TTL (default: 1, local segment only).
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Receive our own datagrams (default: true).
    #[serde(default = "default_loopback")]
    pub loopback: bool,
    /// Seconds between presence re-announcements (default: 5, 0 = never).
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    /// Milliseconds to wait after announcing departure before closing
    /// the socket (default: 1000).
    #[serde(default = "default_leave_grace_ms")]
    pub leave_grace_ms: u64,
    /// Resync ticks a silent member survives (default: 3, 0 = never expire).
    #[serde(default = "default_member_ttl_ticks")]
    pub member_ttl_ticks: u32,
}

// Default value functions
fn default_group() -> Ipv4Addr {
    DEFAULT_GROUP
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_ttl() -> u32 {
    1
}

fn default_loopback() -> bool {
    true
}

fn default_resync_interval_secs() -> u64 {
    DEFAULT_RESYNC_INTERVAL.as_secs()
}

fn default_leave_grace_ms() -> u64 {
    1000
}

fn default_member_ttl_ticks() -> u32 {
    DEFAULT_MEMBER_TTL_TICKS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            interface: default_interface(),
            ttl: default_ttl(),
            loopback: default_loopback(),
            resync_interval_secs: default_resync_interval_secs(),
            leave_grace_ms: default_leave_grace_ms(),
            member_ttl_ticks: default_member_ttl_ticks(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.group.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "group {} is not a multicast address",
                self.group
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }
        Ok(())
    }

    /// Socket options for the multicast transport.
    pub fn multicast_options(&self) -> MulticastOptions {
        MulticastOptions {
            interface: self.interface,
            ttl: self.ttl,
            loopback: self.loopback,
        }
    }

    /// Timing and presence options for a session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            resync: ResyncSchedule::new(Duration::from_secs(self.resync_interval_secs)),
            leave_grace: Duration::from_millis(self.leave_grace_ms),
            member_ttl_ticks: self.member_ttl_ticks,
            loopback: self.loopback,
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(ConfigError::SerializeError)
    }
}

/// Knobs consumed by [`ChatSession`](crate::ChatSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// When to re-announce presence. A zero interval disables resync.
    pub resync: ResyncSchedule,
    /// Pause between announcing departure and closing the transport.
    pub leave_grace: Duration,
    /// Resync ticks a silent member survives (0 = never expire).
    pub member_ttl_ticks: u32,
    /// Whether our own datagrams are looped back to us. Must match the
    /// transport, otherwise our snapshots are mistaken for echoes or the
    /// other way round.
    pub loopback: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionConfig::default().session_options()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.group, Ipv4Addr::new(239, 0, 1, 2));
        assert_eq!(config.port, 20480);
        assert_eq!(config.ttl, 1);
        assert!(config.loopback);
        assert_eq!(config.resync_interval_secs, 5);
        assert_eq!(config.leave_grace_ms, 1000);
        assert_eq!(config.member_ttl_ticks, 3);
        config.validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
group = "239.1.1.1"
port = 30000
interface = "192.168.1.5"
ttl = 4
loopback = false
resync_interval_secs = 10
leave_grace_ms = 250
member_ttl_ticks = 0
"#;

        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.group, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(config.port, 30000);
        assert_eq!(config.interface, Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(config.ttl, 4);
        assert!(!config.loopback);
        assert_eq!(config.resync_interval_secs, 10);
        assert_eq!(config.leave_grace_ms, 250);
        assert_eq!(config.member_ttl_ticks, 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<SessionConfig, _> = toml::from_str("colour = \"blue\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn non_multicast_group_is_invalid() {
        let config = SessionConfig {
            group: Ipv4Addr::new(10, 0, 0, 1),
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 21000").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 21000);
        assert_eq!(config.group, DEFAULT_GROUP);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "group = \"1.2.3.4\"").unwrap();
        assert!(matches!(
            SessionConfig::from_file(bad.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn from_file_reports_missing_and_malformed() {
        let missing = SessionConfig::from_file(Path::new("/nonexistent/lanchat.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        let malformed = SessionConfig::from_file(file.path());
        assert!(matches!(malformed, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn toml_output_parses_back() {
        let config = SessionConfig {
            port: 25000,
            member_ttl_ticks: 7,
            ..SessionConfig::default()
        };
        let rendered = config.to_toml().unwrap();
        let parsed: SessionConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn session_options_follow_config() {
        let config = SessionConfig {
            resync_interval_secs: 2,
            leave_grace_ms: 10,
            member_ttl_ticks: 5,
            loopback: false,
            ..SessionConfig::default()
        };
        let options = config.session_options();
        assert_eq!(options.resync.interval(), Duration::from_secs(2));
        assert!(options.resync.first_delay() < Duration::from_secs(2));
        assert_eq!(options.leave_grace, Duration::from_millis(10));
        assert_eq!(options.member_ttl_ticks, 5);
        assert!(!options.loopback);
        assert!(SessionOptions::default().loopback);
    }
}
