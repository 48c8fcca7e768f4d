//! # Bufferflow Core
//!
//! Core types shared by the Bufferflow crates: the error taxonomy and the
//! hub events that buffer-flow controllers publish.

pub mod error;
pub mod event_bus;

pub use error::{ConnectionError, Error, FirmwareError, FlowError, Result};

pub use event_bus::{CommandResult, CompletionKind, EventBus, EventSink, HubEvent, LineData};
