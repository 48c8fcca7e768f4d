//! Port connection with buffered sending
//!
//! A [`SerialConnection`] owns one open port and the flow controller
//! selected for it. Submissions are broken apart and staged; a writer
//! thread takes staged commands one at a time, waits on the flow
//! controller for room in the device buffer, and writes them. A reader
//! thread feeds everything the device sends back into the controller.

use super::serial::SerialPort;
use super::Transport;
use crate::firmware::{create_buffer_flow, BufferAlgorithm, BufferFlow, FlowOptions};
use bufferflow_core::{
    CommandResult, CompletionKind, ConnectionError, EventSink, FlowError, HubEvent, LineData,
    Result,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READ_BUFFER_SIZE: usize = 1024;
const IDLE_READ_BACKOFF: Duration = Duration::from_millis(5);
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// A command accepted for sending but not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCommand {
    /// Command text including its terminator
    pub data: String,
    /// Correlation id from the submitter
    pub id: String,
}

/// Write side of a port plus its outbound staging area
///
/// This is the [`Transport`] handed to the flow controller.
pub struct PortLink {
    name: String,
    port: Mutex<Box<dyn SerialPort>>,
    staging: Mutex<VecDeque<StagedCommand>>,
    staged: Condvar,
    // Set while the writer holds a command it has taken from staging.
    in_hand: AtomicBool,
    closed: AtomicBool,
}

impl PortLink {
    /// Wrap the write handle of an open port
    pub fn new(name: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.into(),
            port: Mutex::new(port),
            staging: Mutex::new(VecDeque::new()),
            staged: Condvar::new(),
            in_hand: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Accept a command for sending
    pub fn stage(&self, data: impl Into<String>, id: impl Into<String>) -> Result<()> {
        if self.is_closed() {
            return Err(FlowError::StagingClosed {
                port: self.name.clone(),
            }
            .into());
        }

        self.staging.lock().push_back(StagedCommand {
            data: data.into(),
            id: id.into(),
        });
        self.staged.notify_one();
        Ok(())
    }

    /// Take the next staged command, blocking until one arrives
    ///
    /// The command still counts towards [`Transport::items_in_buffer`]
    /// until [`PortLink::finish_staged`]. Returns `None` once the link is
    /// closed.
    pub fn next_staged(&self) -> Option<StagedCommand> {
        let mut staging = self.staging.lock();
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(command) = staging.pop_front() {
                self.in_hand.store(true, Ordering::SeqCst);
                return Some(command);
            }
            self.staged.wait(&mut staging);
        }
    }

    /// The command taken by [`PortLink::next_staged`] was written or dropped
    pub fn finish_staged(&self) {
        self.in_hand.store(false, Ordering::SeqCst);
    }

    /// Stop accepting and handing out commands
    ///
    /// Returns false if the link was already closed.
    pub fn mark_closed(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        // Take the staging lock so a writer between its check and its wait sees the flag.
        let _staging = self.staging.lock();
        self.staged.notify_all();
        was_open
    }

    /// Whether the link has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the underlying port
    pub fn close_port(&self) -> io::Result<()> {
        self.port.lock().close()
    }
}

impl Transport for PortLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.name),
            ));
        }
        self.port.lock().write(data)
    }

    fn drain_staged(&self) -> usize {
        let mut staging = self.staging.lock();
        for command in staging.iter() {
            tracing::trace!("Dropping staged {:?} (id {})", command.data, command.id);
        }
        let drained = staging.len();
        staging.clear();
        drained
    }

    fn items_in_buffer(&self) -> usize {
        let staging = self.staging.lock();
        staging.len() + usize::from(self.in_hand.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for PortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortLink")
            .field("name", &self.name)
            .field("items_in_buffer", &self.items_in_buffer())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An open port with flow-controlled sending
pub struct SerialConnection {
    link: Arc<PortLink>,
    flow: Arc<dyn BufferFlow>,
    sink: Arc<dyn EventSink>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SerialConnection {
    /// Start reader and writer threads for `port` using `algorithm`
    pub fn open(
        port: Box<dyn SerialPort>,
        algorithm: BufferAlgorithm,
        options: FlowOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let name = port.name();
        let reader_port = port.try_clone()?;
        let link = Arc::new(PortLink::new(name.clone(), port));
        let flow = create_buffer_flow(algorithm, link.clone(), sink.clone(), options)?;

        let connection = Self {
            link,
            flow,
            sink,
            threads: Mutex::new(Vec::new()),
        };

        if let Err(e) = connection.spawn_threads(reader_port) {
            tracing::error!("Failed to start I/O threads for {}: {}", name, e);
            connection.shutdown();
            return Err(e.into());
        }

        tracing::info!("Opened {} with {} buffer flow", name, algorithm);
        Ok(connection)
    }

    fn spawn_threads(&self, reader_port: Box<dyn SerialPort>) -> io::Result<()> {
        let name = self.link.port_name().to_string();

        let reader = {
            let link = self.link.clone();
            let flow = self.flow.clone();
            let sink = self.sink.clone();
            thread::Builder::new()
                .name(format!("serial-read {}", name))
                .spawn(move || run_reader(reader_port, link, flow, sink))?
        };
        self.threads.lock().push(reader);

        let writer = {
            let link = self.link.clone();
            let flow = self.flow.clone();
            let sink = self.sink.clone();
            thread::Builder::new()
                .name(format!("serial-write {}", name))
                .spawn(move || run_writer(link, flow, sink))?
        };
        self.threads.lock().push(writer);

        Ok(())
    }

    /// Display name of the port
    pub fn port_name(&self) -> &str {
        self.link.port_name()
    }

    /// The flow controller driving this port
    pub fn flow(&self) -> &Arc<dyn BufferFlow> {
        &self.flow
    }

    /// Commands staged but not yet written, including one the writer is
    /// holding for room in the device buffer
    pub fn items_in_buffer(&self) -> usize {
        self.link.items_in_buffer()
    }

    /// Nothing left to write and nothing awaiting an acknowledgment
    pub fn is_idle(&self) -> bool {
        self.items_in_buffer() == 0 && self.flow.in_flight() == 0
    }

    /// Submit raw text from a client
    ///
    /// A submission that is exactly one immediate character, optionally
    /// with its line terminator, is written straight away and may pause,
    /// resume or wipe the buffer. Everything else is split into atomic
    /// commands and staged for the writer thread.
    pub fn submit(&self, data: &str, id: &str) -> Result<()> {
        if self.link.is_closed() {
            return Err(ConnectionError::Closed {
                port: self.port_name().to_string(),
            }
            .into());
        }

        if self.flow.should_skip_buffer(data) {
            let directive = data.trim();
            tracing::debug!("Sending {:?} directly, skipping buffer", directive);
            self.write_now(directive.as_bytes())?;

            if self.flow.should_pause_buffer(data) {
                self.flow.pause();
            }
            if self.flow.should_unpause_buffer(data) {
                self.flow.unpause();
            }
            if self.flow.should_wipe_buffer(data) {
                self.flow.local_buffer_wipe();
            }
            return Ok(());
        }

        for command in self.flow.break_apart_commands(data) {
            self.link.stage(command, id)?;
        }
        Ok(())
    }

    /// Write bytes to the device immediately, bypassing the buffer
    pub fn write_now(&self, data: &[u8]) -> Result<usize> {
        write_reporting(&self.link, &self.sink, data)
    }

    /// Stop polling, cancel any blocked send, stop the threads and close
    /// the port
    pub fn close(&self) -> Result<()> {
        if !self.shutdown() {
            return Ok(());
        }
        self.link.close_port()?;
        tracing::info!("Closed {}", self.port_name());
        Ok(())
    }

    fn shutdown(&self) -> bool {
        if !self.link.mark_closed() {
            return false;
        }

        self.flow.close();
        self.flow.release_lock();

        let current = thread::current().id();
        for handle in self.threads.lock().drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            // A writer can re-block between the release above and seeing the closed flag.
            while !handle.is_finished() {
                self.flow.release_lock();
                thread::sleep(SHUTDOWN_POLL);
            }
            if handle.join().is_err() {
                tracing::warn!("I/O thread for {} panicked", self.port_name());
            }
        }
        true
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Error closing {}: {}", self.port_name(), e);
        }
    }
}

fn write_reporting(link: &PortLink, sink: &Arc<dyn EventSink>, data: &[u8]) -> Result<usize> {
    link.write(data).map_err(|e| {
        let err = ConnectionError::WriteFailed {
            port: link.port_name().to_string(),
            reason: e.to_string(),
        };
        tracing::error!("{}", err);
        sink.publish(HubEvent::Diagnostic(err.to_string()));
        err.into()
    })
}

fn run_writer(link: Arc<PortLink>, flow: Arc<dyn BufferFlow>, sink: Arc<dyn EventSink>) {
    while let Some(staged) = link.next_staged() {
        let decision = flow.block_until_ready(&staged.data, &staged.id);
        if !decision.proceed {
            link.finish_staged();
            tracing::debug!("Not sending {:?} (id {}), buffer was wiped", staged.data, staged.id);
            continue;
        }

        let payload = if decision.rewritten.is_empty() {
            &staged.data
        } else {
            &decision.rewritten
        };

        let written = write_reporting(&link, &sink, payload.as_bytes()).is_ok();
        link.finish_staged();
        if written && !decision.expect_ack {
            sink.publish(HubEvent::Command(CommandResult {
                kind: CompletionKind::Complete,
                id: staged.id,
                port: link.port_name().to_string(),
                queue_bytes: 0,
                command: staged.data,
            }));
        }
    }
    tracing::debug!("Writer for {} stopped", link.port_name());
}

fn run_reader(
    mut port: Box<dyn SerialPort>,
    link: Arc<PortLink>,
    flow: Arc<dyn BufferFlow>,
    sink: Arc<dyn EventSink>,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut carry = Vec::new();
    let republishes = flow.is_buffer_globally_sending_back_incoming_data();

    while !link.is_closed() {
        match port.read(&mut buf) {
            Ok(0) => thread::sleep(IDLE_READ_BACKOFF),
            Ok(n) => {
                let text = decode_chunk(&mut carry, &buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if !republishes {
                    sink.publish(HubEvent::Line(LineData {
                        port: link.port_name().to_string(),
                        data: text.clone(),
                    }));
                }
                flow.on_incoming_data(&text);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                if !link.is_closed() {
                    let message = format!("Error reading from {}: {}", link.port_name(), e);
                    tracing::error!("{}", message);
                    sink.publish(HubEvent::Diagnostic(message));
                }
                break;
            }
        }
    }
    tracing::debug!("Reader for {} stopped", link.port_name());
}

/// Decode bytes as UTF-8, holding back an incomplete trailing sequence
fn decode_chunk(carry: &mut Vec<u8>, bytes: &[u8]) -> String {
    carry.extend_from_slice(bytes);
    let valid = match std::str::from_utf8(carry) {
        Ok(_) => carry.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => carry.len(),
    };
    let text = String::from_utf8_lossy(&carry[..valid]).into_owned();
    carry.drain(..valid);
    text
}
