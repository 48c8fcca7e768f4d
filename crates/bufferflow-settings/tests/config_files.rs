//! Loading and saving configuration files

use bufferflow_settings::{Config, ConfigError, SettingsError};
use std::time::Duration;
use tempfile::TempDir;

fn sample() -> Config {
    let mut config = Config::new();
    config.connection.port = "/dev/ttyUSB0".to_string();
    config.connection.baud_rate = 250000;
    config.connection.firmware = "marlin".to_string();
    config.flow.capacity = Some(96);
    config.flow.status_poll_interval_ms = Some(500);
    config
}

#[test]
fn test_save_and_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bufferflow.toml");

    sample().save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();

    assert_eq!(loaded, sample());
    assert_eq!(loaded.flow.status_poll_interval(), Some(Duration::from_millis(500)));
}

#[test]
fn test_save_and_load_json_in_new_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("bufferflow.json");

    sample().save_to_file(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"firmware\": \"marlin\""));

    assert_eq!(Config::load_from_file(&path).unwrap(), sample());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::IoError(_))
    ));
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[connection]\nbaud_rate = 0\n").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::Config(ConfigError::ValueOutOfRange { .. }))
    ));
}

#[test]
fn test_malformed_file_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"connection\": ").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::JsonError(_))
    ));
}

#[test]
fn test_invalid_config_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("never.toml");
    let mut config = sample();
    config.flow.capacity = Some(0);

    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}
