//! # Event Bus Module
//!
//! The hub through which buffer-flow controllers report completions,
//! errors, passthrough lines, queue wipes and diagnostics.
//!
//! Controllers only see the [`EventSink`] capability; [`EventBus`] is the
//! in-process implementation that fans events out to subscribers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bufferflow_core::event_bus::EventBus;
//!
//! let bus = EventBus::new();
//! bus.subscribe(|event| println!("{}", event.to_wire()));
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
