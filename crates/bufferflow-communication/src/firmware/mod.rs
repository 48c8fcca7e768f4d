//! Firmware buffer-flow implementations
//!
//! Supported dialects:
//! - Repetier
//! - Marlin
//!
//! The remaining algorithm names are recognised so configuration errors
//! can tell "unknown" apart from "not built here".

pub mod bufferflow;
pub mod marlin;
pub mod repetier;

pub use bufferflow::{BufferFlow, FlowController, FlowOptions, SendDecision};
pub use marlin::Marlin;
pub use repetier::Repetier;

use crate::communication::Transport;
use bufferflow_core::{EventSink, FirmwareError, Result};
use std::str::FromStr;
use std::sync::Arc;

/// Buffer algorithms a port can be opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferAlgorithm {
    /// No flow control
    Default,
    /// Time-based pacing
    Timed,
    /// NodeMCU Lua console
    NodeMcu,
    /// TinyG
    TinyG,
    /// TinyG, pre-1.0 protocol
    TinyGOld,
    /// TinyG line mode
    TinyGLineMode,
    /// TinyG transaction-id mode
    TinyGTidMode,
    /// g2core
    TinyGG2,
    /// GRBL
    Grbl,
    /// Marlin
    Marlin,
    /// Repetier
    #[default]
    Repetier,
    /// Smoothieware
    Smoothie,
}

impl BufferAlgorithm {
    /// Every algorithm name accepted in configuration
    pub const ALL: [BufferAlgorithm; 12] = [
        Self::Default,
        Self::Timed,
        Self::NodeMcu,
        Self::TinyG,
        Self::TinyGOld,
        Self::TinyGLineMode,
        Self::TinyGTidMode,
        Self::TinyGG2,
        Self::Grbl,
        Self::Marlin,
        Self::Repetier,
        Self::Smoothie,
    ];

    /// Configuration name of the algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Timed => "timed",
            Self::NodeMcu => "nodemcu",
            Self::TinyG => "tinyg",
            Self::TinyGOld => "tinyg_old",
            Self::TinyGLineMode => "tinyg_linemode",
            Self::TinyGTidMode => "tinyg_tidmode",
            Self::TinyGG2 => "tinygg2",
            Self::Grbl => "grbl",
            Self::Marlin => "marlin",
            Self::Repetier => "repetier",
            Self::Smoothie => "smoothie",
        }
    }

    /// Whether this build can open a port with the algorithm
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Marlin | Self::Repetier)
    }

    /// Algorithms this build can open a port with
    pub fn supported() -> Vec<BufferAlgorithm> {
        Self::ALL.into_iter().filter(|a| a.is_supported()).collect()
    }
}

impl std::fmt::Display for BufferAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BufferAlgorithm {
    type Err = FirmwareError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| FirmwareError::UnknownBufferAlgorithm {
                name: s.to_string(),
            })
    }
}

/// Build and start the flow controller for `algorithm`
pub fn create_buffer_flow(
    algorithm: BufferAlgorithm,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    options: FlowOptions,
) -> Result<Arc<dyn BufferFlow>> {
    let flow: Arc<dyn BufferFlow> = match algorithm {
        BufferAlgorithm::Repetier => {
            let flow = FlowController::new(Repetier, transport, sink, options);
            flow.start()?;
            Arc::new(flow)
        }
        BufferAlgorithm::Marlin => {
            let flow = FlowController::new(Marlin, transport, sink, options);
            flow.start()?;
            Arc::new(flow)
        }
        other => {
            return Err(FirmwareError::UnsupportedBufferAlgorithm {
                name: other.to_string(),
            }
            .into())
        }
    };

    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!("repetier".parse::<BufferAlgorithm>().ok(), Some(BufferAlgorithm::Repetier));
        assert_eq!(" Marlin ".parse::<BufferAlgorithm>().ok(), Some(BufferAlgorithm::Marlin));
        assert_eq!("tinyg_tidmode".parse::<BufferAlgorithm>().ok(), Some(BufferAlgorithm::TinyGTidMode));
        assert!(matches!(
            "klipper".parse::<BufferAlgorithm>(),
            Err(FirmwareError::UnknownBufferAlgorithm { .. })
        ));
    }

    #[test]
    fn test_names_round_trip() {
        for algorithm in BufferAlgorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<BufferAlgorithm>().ok(), Some(algorithm));
        }
    }

    #[test]
    fn test_supported_algorithms() {
        assert_eq!(
            BufferAlgorithm::supported(),
            vec![BufferAlgorithm::Marlin, BufferAlgorithm::Repetier]
        );
        assert!(!BufferAlgorithm::Grbl.is_supported());
    }
}
