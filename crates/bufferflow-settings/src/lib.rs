//! Bufferflow Settings Crate
//!
//! Loads, validates and saves the connection and flow-control settings the
//! `bufferflow` binary starts from.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, FlowSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
