//! Shared flow controller
//!
//! Implements [`BufferFlow`] once for every firmware dialect. The dialect
//! supplies capacity, patterns and tokens; the queue, gate, line assembly
//! and status polling live here.

use super::assembler::{classify, LineAssembler, ResponseClass};
use super::dialect::Dialect;
use super::gate::{PauseGate, ReleaseKind};
use super::poller::StatusPoller;
use super::preprocessor::{split_submission, DirectiveTokens, SubmissionItem};
use super::queue::CommandQueue;
use super::{BufferFlow, FlowOptions, SendDecision};
use crate::communication::Transport;
use bufferflow_core::{
    CommandResult, CompletionKind, EventSink, FlowError, HubEvent, LineData, Result,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Latest values seen from the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// Most recent status report line
    pub last_status: String,
    /// Most recent boot banner
    pub firmware_banner: String,
}

/// Buffer-flow controller for one connection
pub struct FlowController<D: Dialect> {
    dialect: D,
    capacity: usize,
    poll_interval: Duration,
    poll_enabled: bool,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    queue: CommandQueue,
    gate: PauseGate,
    // Serializes "queue changed, re-evaluate the gate" between sender and receiver.
    flow_lock: Mutex<()>,
    assembler: Mutex<LineAssembler>,
    snapshot: RwLock<ConnectionSnapshot>,
    manual_paused: AtomicBool,
    poller: Mutex<Option<StatusPoller>>,
}

impl<D: Dialect> FlowController<D> {
    /// Create a controller for `dialect` writing to `transport`
    ///
    /// The status poller is not started until [`FlowController::start`].
    pub fn new(
        dialect: D,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        options: FlowOptions,
    ) -> Self {
        let capacity = options.capacity.unwrap_or_else(|| dialect.capacity());
        let poll_interval = options
            .status_poll_interval
            .unwrap_or_else(|| dialect.status_poll_interval());

        tracing::info!(
            "Initializing {} buffer flow on {} (capacity {} bytes)",
            dialect.name(),
            transport.port_name(),
            capacity
        );

        Self {
            dialect,
            capacity,
            poll_interval,
            poll_enabled: !options.disable_status_poll,
            transport,
            sink,
            queue: CommandQueue::new(),
            gate: PauseGate::new(),
            flow_lock: Mutex::new(()),
            assembler: Mutex::new(LineAssembler::new()),
            snapshot: RwLock::new(ConnectionSnapshot::default()),
            manual_paused: AtomicBool::new(false),
            poller: Mutex::new(None),
        }
    }

    /// Start the background status poller, if enabled
    pub fn start(&self) -> Result<()> {
        if !self.poll_enabled {
            tracing::debug!("Status polling disabled for {}", self.port());
            return Ok(());
        }

        let mut poller = self.poller.lock();
        if poller.is_none() {
            *poller = Some(StatusPoller::spawn(
                self.transport.clone(),
                self.sink.clone(),
                format!("{}\n", self.dialect.status_query()),
                self.poll_interval,
            )?);
        }
        Ok(())
    }

    /// Device buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The in-flight command queue
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Whether the gate is currently paused
    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Latest status and banner seen on this connection
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.read().clone()
    }

    /// Whether the status poller thread is alive
    pub fn is_polling(&self) -> bool {
        self.poller.lock().as_ref().is_some_and(|p| p.is_running())
    }

    fn port(&self) -> &str {
        self.transport.port_name()
    }

    fn tokens(&self) -> DirectiveTokens<'static> {
        DirectiveTokens {
            init: self.dialect.init_token(),
            status: self.dialect.status_token(),
            wipe: self.dialect.wipe_token(),
            status_query: self.dialect.status_query(),
        }
    }

    fn publish_line(&self, line: &str) {
        self.sink
            .publish(HubEvent::Line(LineData::new(self.port(), line)));
    }

    /// Retire the oldest queued command for an `ok` or `error` line
    fn retire_oldest(&self, kind: CompletionKind, line: &str) {
        let retired = {
            let _flow = self.flow_lock.lock();
            let retired = self.queue.poll().map(|command| (command, self.queue.total_bytes()));

            if self.queue.total_bytes() < self.capacity
                && self.gate.unpause_if_paused(ReleaseKind::Resume)
            {
                tracing::debug!("Buffer has room again, resuming sender");
            }
            retired
        };

        match retired {
            Some((command, queue_bytes)) => {
                if kind == CompletionKind::Error {
                    tracing::warn!("Error response for {:?} (id {})", command.text, command.id);
                }
                tracing::debug!(
                    "Buffer decreased to {} items, {} bytes",
                    self.queue.len(),
                    queue_bytes
                );
                self.sink.publish(HubEvent::Command(CommandResult {
                    kind,
                    id: command.id,
                    port: self.port().to_string(),
                    queue_bytes,
                    command: command.text,
                }));
            }
            None => {
                let err = FlowError::UnexpectedAcknowledgment {
                    port: self.port().to_string(),
                    line: line.to_string(),
                };
                tracing::warn!("{}", err);
            }
        }
    }

    fn handle_line(&self, line: &str) {
        let class = classify(line, self.dialect.patterns());
        tracing::trace!("Line {:?} classified as {:?}", line, class);

        match class {
            ResponseClass::Completion => self.retire_oldest(CompletionKind::Complete, line),
            ResponseClass::Error => self.retire_oldest(CompletionKind::Error, line),
            ResponseClass::Banner => {
                tracing::info!("{} reset detected on {}: {}", self.dialect.name(), self.port(), line);
                self.local_buffer_wipe();
                // The wipe already released any waiter; this covers a pause set since.
                self.gate.unpause_if_paused(ReleaseKind::Wipe);
                self.snapshot.write().firmware_banner = line.to_string();
            }
            ResponseClass::StatusReport => {
                self.snapshot.write().last_status = line.to_string();
            }
            ResponseClass::Other => {}
        }

        self.publish_line(line);
    }
}

impl<D: Dialect> BufferFlow for FlowController<D> {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn block_until_ready(&self, cmd: &str, id: &str) -> SendDecision {
        let expect_ack = !self.returns_no_response(cmd);
        let filled = {
            let _flow = self.flow_lock.lock();
            if expect_ack {
                let total = self.queue.push(cmd, id);
                tracing::debug!(
                    "Queued {:?} (id {}, {} bytes), buffer now {} bytes",
                    cmd,
                    id,
                    cmd.len(),
                    total
                );

                let filled = total >= self.capacity;
                if filled {
                    self.gate.pause_and_drain();
                    tracing::debug!("Buffer full, holding {:?} until space is available", cmd);
                }
                filled
            } else {
                tracing::trace!("{:?} (id {}) gets no reply, not queued", cmd, id);
                false
            }
        };

        let release = if filled {
            self.gate.wait_after_pause()
        } else {
            self.gate.wait_for_release()
        };

        let mut decision = match release {
            None | Some(ReleaseKind::Resume) => SendDecision::send(),
            Some(ReleaseKind::Wipe) => {
                tracing::debug!("Send of {:?} (id {}) cancelled by wipe", cmd, id);
                return SendDecision::cancel();
            }
        };

        decision.expect_ack = expect_ack;
        decision.rewritten = self.rewrite_serial_data(cmd, id);
        decision
    }

    fn on_incoming_data(&self, data: &str) {
        tracing::trace!("Incoming on {}: {:?}", self.port(), data);

        let lines = self.assembler.lock().push(data);
        for line in lines {
            self.handle_line(&line);
        }
    }

    fn break_apart_commands(&self, cmd: &str) -> Vec<String> {
        let mut commands = Vec::new();

        for item in split_submission(cmd, &self.tokens()) {
            match item {
                SubmissionItem::Command(command) => commands.push(command),
                SubmissionItem::StatusQuery(query) => {
                    tracing::trace!("Status query queued: {:?}", query);
                    commands.push(query);
                }
                SubmissionItem::Init => {
                    let banner = self.snapshot.read().firmware_banner.clone();
                    self.publish_line(&banner);
                }
                SubmissionItem::Status => {
                    let status = self.snapshot.read().last_status.clone();
                    self.publish_line(&status);
                }
                SubmissionItem::Wipe => {
                    tracing::info!("Wiping {} buffer flow on {}", self.dialect.name(), self.port());
                    self.local_buffer_wipe();
                }
            }
        }

        tracing::debug!("Submission broken into {:?}", commands);
        commands
    }

    fn pause(&self) {
        self.gate.pause();
        tracing::info!("Paused buffer on {}", self.port());
    }

    fn unpause(&self) {
        self.gate.unpause(ReleaseKind::Resume);
        tracing::info!("Unpaused buffer on {}", self.port());
    }

    fn manual_paused(&self) -> bool {
        self.manual_paused.load(Ordering::SeqCst)
    }

    fn set_manual_paused(&self, paused: bool) {
        self.manual_paused.store(paused, Ordering::SeqCst);
    }

    fn should_skip_buffer(&self, cmd: &str) -> bool {
        self.dialect.patterns().skip.is_match(cmd.trim())
    }

    fn should_pause_buffer(&self, cmd: &str) -> bool {
        self.dialect.patterns().pause.is_match(cmd.trim())
    }

    fn should_unpause_buffer(&self, cmd: &str) -> bool {
        self.dialect.patterns().unpause.is_match(cmd.trim())
    }

    fn should_wipe_buffer(&self, cmd: &str) -> bool {
        self.dialect.patterns().wipe.is_match(cmd.trim())
    }

    fn returns_no_response(&self, cmd: &str) -> bool {
        self.dialect
            .patterns()
            .no_response
            .as_ref()
            .is_some_and(|re| re.is_match(cmd.trim()))
    }

    fn in_flight(&self) -> usize {
        self.queue.len()
    }

    fn release_lock(&self) {
        let removed = {
            let _flow = self.flow_lock.lock();
            self.queue.clear()
        };
        tracing::debug!("Released lock on {}, dropped {} queued commands", self.port(), removed);
        self.gate.unpause(ReleaseKind::Wipe);
    }

    fn local_buffer_wipe(&self) {
        let drained = self.transport.drain_staged();
        tracing::debug!("Drained {} staged commands on {}", drained, self.port());

        // Counted before the release so a sender still holding its command is included.
        let queue_count = self.transport.items_in_buffer();
        self.release_lock();

        self.sink.publish(HubEvent::WipedQueue {
            queue_count,
            port: self.port().to_string(),
        });
    }

    fn is_buffer_globally_sending_back_incoming_data(&self) -> bool {
        true
    }

    fn rewrite_serial_data(&self, cmd: &str, id: &str) -> String {
        self.dialect.rewrite(cmd, id).unwrap_or_default()
    }

    fn close(&self) {
        if let Some(mut poller) = self.poller.lock().take() {
            tracing::info!("Stopping the status query loop on {}", self.port());
            poller.stop();
        }
    }
}
