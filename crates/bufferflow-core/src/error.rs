//! Error handling for Bufferflow
//!
//! Provides error types for all layers of the buffer-flow engine:
//! - Connection errors (serial transport)
//! - Firmware errors (dialect selection, pattern compilation)
//! - Flow errors (queue/gate protocol violations)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the serial transport underneath a
/// buffer-flow controller.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// A write to the port failed
    #[error("Error writing to {port}: {reason}")]
    WriteFailed {
        /// The name of the port being written.
        port: String,
        /// The reason the write failed.
        reason: String,
    },

    /// The connection has already been closed
    #[error("Port {port} is closed")]
    Closed {
        /// The name of the closed port.
        port: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Firmware error type
///
/// Represents errors specific to firmware dialects and buffer algorithms.
#[derive(Error, Debug, Clone)]
pub enum FirmwareError {
    /// Unknown buffer algorithm name
    #[error("Unknown buffer algorithm: {name}")]
    UnknownBufferAlgorithm {
        /// The name that did not match any known algorithm.
        name: String,
    },

    /// Known algorithm without an implementation in this build
    #[error("Buffer algorithm {name} is not supported")]
    UnsupportedBufferAlgorithm {
        /// The algorithm name.
        name: String,
    },

    /// Invalid line or directive pattern
    #[error("Invalid pattern for {firmware}: {reason}")]
    InvalidPattern {
        /// The firmware dialect the pattern belongs to.
        firmware: String,
        /// The reason the pattern was rejected.
        reason: String,
    },
}

/// Flow error type
///
/// Raised by the buffer-flow engine when its bookkeeping and the device
/// disagree. These are logged by the engine and never halt line processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// A completion or error line arrived while nothing was in flight
    #[error("Received '{line}' on {port} with an empty command queue")]
    UnexpectedAcknowledgment {
        /// The port the line arrived on.
        port: String,
        /// The response line.
        line: String,
    },

    /// The outbound staging area no longer accepts commands
    #[error("Outbound staging area for {port} is closed")]
    StagingClosed {
        /// The port whose staging area is closed.
        port: String,
    },
}

/// Main error type for Bufferflow
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Firmware error
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Flow error
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Check if this is a firmware error
    pub fn is_firmware_error(&self) -> bool {
        matches!(self, Error::Firmware(_))
    }

    /// Check if this is a flow error
    pub fn is_flow_error(&self) -> bool {
        matches!(self, Error::Flow(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
