//! Event type definitions for the hub.
//!
//! These are the payloads a buffer-flow controller republishes to remote
//! clients. Each event knows how to render itself in the JSON shape clients
//! already understand.

use serde::Serialize;

/// Root event enum for everything a controller publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A queued command was acknowledged with `ok` or rejected with `error`
    Command(CommandResult),
    /// A raw line received from the device, passed through verbatim
    Line(LineData),
    /// The local command queue was wiped
    WipedQueue {
        /// Commands still counted as in flight by the transport after the wipe.
        queue_count: usize,
        /// Display name of the port.
        port: String,
    },
    /// Free-text diagnostic, e.g. a transport write failure
    Diagnostic(String),
}

impl HubEvent {
    /// Render the event in its client-facing wire form
    ///
    /// Diagnostics are sent as plain text, everything else as JSON.
    pub fn to_wire(&self) -> String {
        let rendered = match self {
            HubEvent::Command(result) => serde_json::to_string(result),
            HubEvent::Line(line) => serde_json::to_string(line),
            HubEvent::WipedQueue { queue_count, port } => serde_json::to_string(
                &serde_json::json!({ "Cmd": "WipedQueue", "QCnt": queue_count, "Port": port }),
            ),
            HubEvent::Diagnostic(text) => return text.clone(),
        };

        rendered.unwrap_or_else(|e| {
            tracing::error!("Failed to serialize hub event: {}", e);
            String::new()
        })
    }
}

/// Outcome reported by the device for a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionKind {
    /// The device answered `ok`.
    Complete,
    /// The device answered `error...`.
    Error,
}

/// Completion/error payload
///
/// `BufSize` and `D` are kept for in-process consumers but are not part of
/// the serialized form sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Completion or error.
    #[serde(rename = "Cmd")]
    pub kind: CompletionKind,
    /// Correlation id supplied when the command was submitted.
    #[serde(rename = "Id")]
    pub id: String,
    /// Display name of the port.
    #[serde(rename = "P")]
    pub port: String,
    /// Bytes still outstanding on the device after this command was retired.
    #[serde(skip)]
    pub queue_bytes: usize,
    /// The command text as it was queued.
    #[serde(skip)]
    pub command: String,
}

/// Per-line passthrough payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineData {
    /// Display name of the port.
    #[serde(rename = "P")]
    pub port: String,
    /// Line text including its terminator.
    #[serde(rename = "D")]
    pub data: String,
}

impl LineData {
    /// Create a passthrough payload, appending the line terminator
    pub fn new(port: impl Into<String>, line: &str) -> Self {
        Self {
            port: port.into(),
            data: format!("{}\n", line),
        }
    }
}

/// Capability to publish hub events
///
/// Controllers receive one of these at construction instead of reaching for
/// a process-wide hub. Publishing is fire-and-forget.
pub trait EventSink: Send + Sync {
    /// Publish an event
    fn publish(&self, event: HubEvent);
}
