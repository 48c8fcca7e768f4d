//! Serial transport and connection wiring
//!
//! [`serial`] wraps the physical port, [`connection`] owns the threads and
//! the outbound staging area that sit between a submitter and the device.

pub mod connection;
pub mod serial;

pub use connection::{PortLink, SerialConnection, StagedCommand};
pub use serial::{list_ports, RealSerialPort, SerialPort, SerialSettings};

use std::io;

/// What a flow controller needs from its connection
///
/// Implementations must serialize physical writes: the sender path and the
/// status poller both write through the same handle.
pub trait Transport: Send + Sync {
    /// Display name of the port
    fn port_name(&self) -> &str;

    /// Write raw bytes to the device, returning how many were written
    fn write(&self, data: &[u8]) -> io::Result<usize>;

    /// Discard commands accepted for sending but not yet written
    ///
    /// Returns the number discarded; each one is removed from the in-flight
    /// count.
    fn drain_staged(&self) -> usize;

    /// Commands accepted for sending but not yet written
    ///
    /// Counts a command the sender has taken and is still holding.
    fn items_in_buffer(&self) -> usize;
}
