//! # Configuration Management
//!
//! Centralized configuration for the protocol layer.
//!
//! The protocol version constants below are defaults only. The ranges a
//! process actually advertises are carried by [`ProtocolConfig`] and injected
//! into sessions, so a server can narrow its window without a rebuild.
//!
//! ## Configuration Sources
//! - TOML files via [`ProtocolConfig::from_file`]
//! - Environment overrides via [`ProtocolConfig::from_env`] (`VOXEL_PROTOCOL_*`)
//! - Direct instantiation with defaults

use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::VersionRange;
use crate::protocol::opcode::ProtocolVersion;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Newest protocol version this crate can speak.
pub const LATEST_PROTOCOL_VERSION: ProtocolVersion = 23;

/// Default server window.
pub const SERVER_PROTOCOL_VERSION_MIN: ProtocolVersion = 13;
pub const SERVER_PROTOCOL_VERSION_MAX: ProtocolVersion = LATEST_PROTOCOL_VERSION;

/// Default client window.
pub const CLIENT_PROTOCOL_VERSION_MIN: ProtocolVersion = 13;
pub const CLIENT_PROTOCOL_VERSION_MAX: ProtocolVersion = LATEST_PROTOCOL_VERSION;

/// Identifies this protocol's stream at the transport boundary.
pub const PROTOCOL_ID: u32 = 0x4f45_7403;

/// Highest map serialization format this side can read.
pub const SER_FMT_VER_HIGHEST_READ: u8 = 25;

/// Largest frame accepted by default (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default time allowed for the handshake to finish.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `VOXEL_PROTOCOL_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<ProtocolVersion>("VOXEL_PROTOCOL_SERVER_MIN_VERSION") {
            config.server.versions.min = v;
        }
        if let Some(v) = env_parse::<ProtocolVersion>("VOXEL_PROTOCOL_SERVER_MAX_VERSION") {
            config.server.versions.max = v;
        }
        if let Some(v) = env_parse::<ProtocolVersion>("VOXEL_PROTOCOL_CLIENT_MIN_VERSION") {
            config.client.versions.min = v;
        }
        if let Some(v) = env_parse::<ProtocolVersion>("VOXEL_PROTOCOL_CLIENT_MAX_VERSION") {
            config.client.versions.max = v;
        }
        if let Some(size) = env_parse::<usize>("VOXEL_PROTOCOL_MAX_FRAME_SIZE") {
            config.limits.max_frame_size = size;
        }
        if let Some(ms) = env_parse::<u64>("VOXEL_PROTOCOL_HANDSHAKE_TIMEOUT_MS") {
            config.server.handshake_timeout = Duration::from_millis(ms);
            config.client.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(level) = env_parse::<Level>("VOXEL_PROTOCOL_LOG_LEVEL") {
            config.logging.log_level = level;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.limits.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

fn validate_range(role: &str, range: &VersionRange) -> Vec<String> {
    let mut errors = Vec::new();
    if range.min > range.max {
        errors.push(format!(
            "{role} version range is empty: min {} > max {}",
            range.min, range.max
        ));
    }
    if range.max > LATEST_PROTOCOL_VERSION {
        errors.push(format!(
            "{role} max version {} is newer than the latest supported ({LATEST_PROTOCOL_VERSION})",
            range.max
        ));
    }
    if range.min == 0 {
        errors.push(format!("{role} min version must be at least 1"));
    }
    errors
}

fn validate_handshake_timeout(role: &str, timeout: Duration) -> Vec<String> {
    let mut errors = Vec::new();
    if timeout.as_millis() < 100 {
        errors.push(format!("{role} handshake timeout too short (minimum: 100ms)"));
    } else if timeout.as_secs() > 300 {
        errors.push(format!("{role} handshake timeout too long (maximum: 300s)"));
    }
    errors
}

/// Server-side settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Versions the server accepts
    pub versions: VersionRange,

    /// Map serialization version announced in the `Init` reply
    pub deployed_ser_fmt: u8,

    /// Time a client gets to finish the handshake
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            versions: VersionRange {
                min: SERVER_PROTOCOL_VERSION_MIN,
                max: SERVER_PROTOCOL_VERSION_MAX,
            },
            deployed_ser_fmt: SER_FMT_VER_HIGHEST_READ,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = validate_range("Server", &self.versions);
        if self.deployed_ser_fmt > SER_FMT_VER_HIGHEST_READ {
            errors.push(format!(
                "Deployed serialization format {} exceeds highest readable ({SER_FMT_VER_HIGHEST_READ})",
                self.deployed_ser_fmt
            ));
        }
        errors.extend(validate_handshake_timeout("Server", self.handshake_timeout));
        errors
    }
}

/// Client-side settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Versions the client can speak
    pub versions: VersionRange,

    /// Highest map serialization format the client reads
    pub ser_fmt: u8,

    /// Time the server gets to answer `Init`
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            versions: VersionRange {
                min: CLIENT_PROTOCOL_VERSION_MIN,
                max: CLIENT_PROTOCOL_VERSION_MAX,
            },
            ser_fmt: SER_FMT_VER_HIGHEST_READ,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = validate_range("Client", &self.versions);
        if self.ser_fmt > SER_FMT_VER_HIGHEST_READ {
            errors.push(format!(
                "Client serialization format {} exceeds highest readable ({SER_FMT_VER_HIGHEST_READ})",
                self.ser_fmt
            ));
        }
        errors.extend(validate_handshake_timeout("Client", self.handshake_timeout));
        errors
    }
}

/// Framing limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Largest frame payload accepted, in bytes
    pub max_frame_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_frame_size < 64 {
            errors.push("Max frame size too small (minimum: 64 bytes)".to_string());
        } else if self.max_frame_size > u32::MAX as usize {
            errors.push(format!(
                "Max frame size too large: {} bytes (frame length is a u32)",
                self.max_frame_size
            ));
        }
        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("voxel-protocol"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProtocolConfig::default().validate().is_empty());
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = ProtocolConfig::default();
        assert_eq!(config.server.versions.min, 13);
        assert_eq!(config.server.versions.max, LATEST_PROTOCOL_VERSION);
        assert_eq!(config.client.versions.max, 23);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ProtocolConfig::from_toml(
            r#"
            [server]
            deployed_ser_fmt = 22
            handshake_timeout = 5000

            [server.versions]
            min = 20
            max = 23
            "#,
        )
        .unwrap();
        assert_eq!(config.server.versions.min, 20);
        assert_eq!(config.server.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.client.versions.min, CLIENT_PROTOCOL_VERSION_MIN);
        assert_eq!(config.limits.max_frame_size, MAX_FRAME_SIZE);
    }
}
