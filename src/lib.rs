//! # Bufferflow
//!
//! Host-side buffer-flow control for 3D printers and CNC controllers whose
//! serial receive buffer is a few dozen bytes.
//!
//! ## Architecture
//!
//! Bufferflow is organized as a workspace with multiple crates:
//!
//! 1. **bufferflow-core** - Error types and the event hub
//! 2. **bufferflow-communication** - Serial transport, connections, and the
//!    per-firmware flow controllers
//! 3. **bufferflow-settings** - Configuration files and validation
//! 4. **bufferflow** - Binary that opens a port and pumps stdin through it
//!
//! ## Flow control
//!
//! Every command written to the device is remembered with its byte length
//! until the device acknowledges it. When the remembered bytes reach the
//! device's buffer size, sending stops until an acknowledgment frees room.
//! A firmware reset or an explicit wipe drops everything outstanding.

pub use bufferflow_communication::{
    create_buffer_flow, list_ports, BufferAlgorithm, BufferFlow, FlowOptions, RealSerialPort,
    SerialConnection, SerialSettings,
};
pub use bufferflow_core::{
    CommandResult, CompletionKind, ConnectionError, Error, EventBus, EventSink,
    FirmwareError, FlowError, HubEvent, LineData, Result,
};
pub use bufferflow_settings::{Config, ConnectionSettings, FlowSettings, SettingsError};

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, leaving stdout to hub events
/// - RUST_LOG environment variable support
/// - Thread names, since each port runs its own reader, writer and poller
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Resolve the buffer algorithm named in the configuration
///
/// Unknown names and names this build cannot open are both errors.
pub fn resolve_algorithm(settings: &ConnectionSettings) -> Result<BufferAlgorithm> {
    let algorithm: BufferAlgorithm = settings.firmware.parse()?;
    if !algorithm.is_supported() {
        return Err(FirmwareError::UnsupportedBufferAlgorithm {
            name: algorithm.to_string(),
        }
        .into());
    }
    Ok(algorithm)
}

/// Flow-controller options from the configuration
pub fn flow_options(settings: &FlowSettings) -> FlowOptions {
    FlowOptions {
        capacity: settings.capacity,
        status_poll_interval: settings.status_poll_interval(),
        disable_status_poll: !settings.status_poll_enabled,
    }
}

/// Serial line settings from the configuration
pub fn serial_settings(settings: &ConnectionSettings) -> SerialSettings {
    SerialSettings {
        port: settings.port.clone(),
        baud_rate: settings.baud_rate,
        read_timeout: settings.read_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_resolve_algorithm() {
        let mut settings = ConnectionSettings::default();
        assert_eq!(resolve_algorithm(&settings).ok(), Some(BufferAlgorithm::Repetier));

        settings.firmware = "Marlin".to_string();
        assert_eq!(resolve_algorithm(&settings).ok(), Some(BufferAlgorithm::Marlin));

        settings.firmware = "grbl".to_string();
        assert!(matches!(
            resolve_algorithm(&settings),
            Err(Error::Firmware(FirmwareError::UnsupportedBufferAlgorithm { .. }))
        ));

        settings.firmware = "klipper".to_string();
        assert!(matches!(
            resolve_algorithm(&settings),
            Err(Error::Firmware(FirmwareError::UnknownBufferAlgorithm { .. }))
        ));
    }

    #[test]
    fn test_flow_options_from_settings() {
        let options = flow_options(&FlowSettings::default());
        assert_eq!(options.capacity, None);
        assert_eq!(options.status_poll_interval, None);
        assert!(!options.disable_status_poll);

        let options = flow_options(&FlowSettings {
            capacity: Some(64),
            status_poll_interval_ms: Some(250),
            status_poll_enabled: false,
        });
        assert_eq!(options.capacity, Some(64));
        assert_eq!(options.status_poll_interval, Some(Duration::from_millis(250)));
        assert!(options.disable_status_poll);
    }

    #[test]
    fn test_serial_settings_from_config() {
        let mut settings = ConnectionSettings::default();
        settings.port = "/dev/ttyACM0".to_string();
        settings.read_timeout_ms = 25;

        let serial = serial_settings(&settings);
        assert_eq!(serial.port, "/dev/ttyACM0");
        assert_eq!(serial.baud_rate, 115200);
        assert_eq!(serial.read_timeout, Duration::from_millis(25));
    }
}
