//! Buffer-flow control
//!
//! Keeps a firmware's small receive buffer from overflowing. Every command
//! written to the device is recorded with its byte length; once the
//! recorded total reaches the device capacity the sending thread blocks
//! until acknowledgments free enough room, or until a wipe cancels the
//! pending send.
//!
//! The pieces, leaves first:
//! - [`CommandQueue`]: in-flight commands with byte accounting
//! - [`PauseGate`]: paused flag and single-slot release signal
//! - [`LineAssembler`] / [`classify`]: incoming line handling
//! - [`split_submission`]: submission preprocessing
//! - [`StatusPoller`]: background status queries
//! - [`FlowController`]: ties them together for any [`Dialect`]

pub mod assembler;
pub mod controller;
pub mod dialect;
pub mod gate;
pub mod poller;
pub mod preprocessor;
pub mod queue;

pub use assembler::{classify, LineAssembler, ResponseClass};
pub use controller::{ConnectionSnapshot, FlowController};
pub use dialect::{Dialect, DialectPatterns, PatternSources};
pub use gate::{PauseGate, ReleaseKind};
pub use poller::StatusPoller;
pub use preprocessor::{split_submission, strip_comments, DirectiveTokens, SubmissionItem};
pub use queue::{CommandQueue, QueuedCommand};

use std::time::Duration;

/// Outcome of [`BufferFlow::block_until_ready`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDecision {
    /// Whether the caller may write the command
    pub proceed: bool,
    /// Whether the device is expected to acknowledge it
    pub expect_ack: bool,
    /// Replacement text to write instead; empty means send as given
    pub rewritten: String,
}

impl SendDecision {
    /// Send the command, expecting an acknowledgment
    pub fn send() -> Self {
        Self {
            proceed: true,
            expect_ack: true,
            rewritten: String::new(),
        }
    }

    /// Do not send; the queue has been wiped
    pub fn cancel() -> Self {
        Self {
            proceed: false,
            expect_ack: false,
            rewritten: String::new(),
        }
    }
}

/// Runtime tuning for a flow controller
///
/// Unset values fall back to the dialect's own constants.
#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    /// Override of the device buffer capacity in bytes
    pub capacity: Option<usize>,
    /// Override of the status poll interval
    pub status_poll_interval: Option<Duration>,
    /// Disable the background status poller
    pub disable_status_poll: bool,
}

/// Per-connection buffer-flow protocol engine
///
/// One instance per open port, shared by the sender path, the receiver
/// path and the status poller.
pub trait BufferFlow: Send + Sync {
    /// Firmware name of this flow
    fn name(&self) -> &str;

    /// Queue `cmd` and block while the device buffer is full
    fn block_until_ready(&self, cmd: &str, id: &str) -> SendDecision;

    /// Feed raw bytes received from the device
    fn on_incoming_data(&self, data: &str);

    /// Split a submission into atomic commands, handling local directives
    fn break_apart_commands(&self, cmd: &str) -> Vec<String>;

    /// Force the gate closed
    fn pause(&self);

    /// Open the gate, resuming a blocked sender
    fn unpause(&self);

    /// User-initiated pause flag, independent of buffer fullness
    fn manual_paused(&self) -> bool;

    /// Set the user-initiated pause flag
    fn set_manual_paused(&self, paused: bool);

    /// Command must be written immediately, never queued
    fn should_skip_buffer(&self, cmd: &str) -> bool;

    /// Command forces the buffer to pause
    fn should_pause_buffer(&self, cmd: &str) -> bool;

    /// Command forces the buffer to resume
    fn should_unpause_buffer(&self, cmd: &str) -> bool;

    /// Command wipes the buffer
    fn should_wipe_buffer(&self, cmd: &str) -> bool;

    /// Command never gets an acknowledgment from the device
    fn returns_no_response(&self, cmd: &str) -> bool;

    /// Commands written to the device and not yet acknowledged
    fn in_flight(&self) -> usize;

    /// Clear the queue and cancel any blocked sender
    fn release_lock(&self);

    /// Full wipe: drain staged commands, release the lock, notify the hub
    fn local_buffer_wipe(&self);

    /// Whether this flow republishes incoming lines itself
    fn is_buffer_globally_sending_back_incoming_data(&self) -> bool;

    /// Protocol-specific re-encoding of a command; empty means unchanged
    fn rewrite_serial_data(&self, cmd: &str, id: &str) -> String;

    /// Stop background work
    fn close(&self);
}
