//! Configuration management for Bufferflow
//!
//! Settings are read from a JSON or TOML file, chosen by extension. Every
//! field has a default, so a file only needs the values it changes.
//!
//! Configuration is organized into two sections:
//! - Connection settings (port, baud rate, buffer algorithm)
//! - Flow settings (buffer capacity and status polling overrides)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port path, e.g. "/dev/ttyUSB0" or "COM3"
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Buffer algorithm name, e.g. "repetier"
    pub firmware: String,
    /// Serial read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            firmware: "repetier".to_string(),
            read_timeout_ms: 10,
        }
    }
}

impl ConnectionSettings {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Flow-control settings
///
/// Unset overrides fall back to the firmware's own constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Device buffer capacity in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Interval between status queries in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_poll_interval_ms: Option<u64>,
    /// Whether to send periodic status queries at all
    pub status_poll_enabled: bool,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            capacity: None,
            status_poll_interval_ms: None,
            status_poll_enabled: true,
        }
    }
}

impl FlowSettings {
    /// Status poll interval override as a duration
    pub fn status_poll_interval(&self) -> Option<Duration> {
        self.status_poll_interval_ms.map(Duration::from_millis)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Flow-control settings
    pub flow: FlowSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config file location, e.g. `~/.config/bufferflow/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("bufferflow").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    ///
    /// The port may be empty here; it is required only when connecting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.baud_rate == 0 {
            return Err(out_of_range("connection.baud_rate", 0));
        }

        if self.connection.read_timeout_ms == 0 {
            return Err(out_of_range("connection.read_timeout_ms", 0));
        }

        if self.connection.firmware.trim().is_empty() {
            return Err(ConfigError::MissingKey("connection.firmware".to_string()));
        }

        if let Some(capacity) = self.flow.capacity.filter(|c| *c == 0) {
            return Err(out_of_range("flow.capacity", capacity));
        }

        if let Some(interval) = self.flow.status_poll_interval_ms.filter(|i| *i == 0) {
            return Err(out_of_range("flow.status_poll_interval_ms", interval));
        }

        Ok(())
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.connection.firmware, "repetier");
        assert!(config.flow.status_poll_enabled);
        assert_eq!(config.flow.capacity, None);
        assert_eq!(config.flow.status_poll_interval(), None);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::new();
        config.connection.baud_rate = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange {
                key: "connection.baud_rate".to_string(),
                value: "0".to_string(),
            })
        );

        let mut config = Config::new();
        config.flow.capacity = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.flow.status_poll_interval_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.connection.firmware = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingKey("connection.firmware".to_string()))
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            port = "/dev/ttyACM0"

            [flow]
            capacity = 63
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.port, "/dev/ttyACM0");
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.flow.capacity, Some(63));
        assert!(config.flow.status_poll_enabled);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = Config::load_from_file(Path::new("settings.yaml")).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::UnsupportedFormat(ref ext)) if ext == "yaml"
        ));
    }
}
