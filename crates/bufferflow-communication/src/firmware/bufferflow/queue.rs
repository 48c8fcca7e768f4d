//! In-flight command queue with byte accounting
//!
//! Records every command handed to the device that has not yet been
//! answered, in submission order. The firmware executes its receive buffer
//! FIFO, so the oldest entry is always the one the next `ok` refers to.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A command that has been queued for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    /// The command text exactly as it will be written
    pub text: String,
    /// Correlation id supplied by the submitter
    pub id: String,
    /// Bytes this command occupies in the device's receive buffer
    pub byte_length: usize,
}

impl QueuedCommand {
    /// Create a new queued command
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        let text = text.into();
        let byte_length = text.len();
        Self {
            text,
            id: id.into(),
            byte_length,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueuedCommand>,
    total_bytes: usize,
}

/// FIFO of in-flight commands
///
/// Every operation takes the internal lock, so sender and receiver threads
/// may push and poll concurrently.
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command and return the new total byte count
    ///
    /// No bound is enforced here; callers decide what a full buffer means.
    pub fn push(&self, text: impl Into<String>, id: impl Into<String>) -> usize {
        let command = QueuedCommand::new(text, id);
        let mut state = self.state.lock();
        state.total_bytes += command.byte_length;
        state.items.push_back(command);
        state.total_bytes
    }

    /// Remove and return the oldest command
    pub fn poll(&self) -> Option<QueuedCommand> {
        let mut state = self.state.lock();
        let command = state.items.pop_front()?;
        state.total_bytes -= command.byte_length;
        Some(command)
    }

    /// Sum of `byte_length` over queued commands
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Drop every queued command, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.items.len();
        state.items.clear();
        state.total_bytes = 0;
        removed
    }
}
