//! Serial port communication implementation
//!
//! Provides the low-level port operations a connection needs: open with
//! the configured line settings, read with a short timeout, write, and
//! clone a second handle so reads never wait behind writes.

use bufferflow_core::{ConnectionError, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Line settings for opening a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Port path, e.g. "/dev/ttyUSB0" or "COM3"
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout; keeps the reader thread responsive to close
    pub read_timeout: Duration,
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.into_iter().map(|port| port.port_name).collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::InvalidParameters {
                reason: format!("failed to enumerate ports: {}", e),
            }
            .into())
        }
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write data to the port
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read data from the port
    ///
    /// Returns `ErrorKind::TimedOut` when nothing arrived within the read
    /// timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the port name
    fn name(&self) -> String;

    /// Open a second handle to the same port
    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>>;

    /// Close the port
    fn close(&mut self) -> io::Result<()>;
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    /// Open a serial port with the given settings
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        if settings.baud_rate == 0 {
            return Err(ConnectionError::InvalidParameters {
                reason: "baud rate must be positive".to_string(),
            }
            .into());
        }

        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", settings.port, e);
                ConnectionError::FailedToOpen {
                    port: settings.port.clone(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!("Opened {} at {} baud", settings.port, settings.baud_rate);
        Ok(Self {
            name: settings.port.clone(),
            port,
        })
    }
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(Box::new(RealSerialPort {
            name: self.name.clone(),
            port,
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        // serialport closes the handle on drop
        Ok(())
    }
}
