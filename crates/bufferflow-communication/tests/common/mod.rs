//! Shared fakes for the communication integration tests

#![allow(dead_code)]

use bufferflow_communication::{SerialPort, Transport};
use bufferflow_core::{CompletionKind, EventSink, HubEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Transport that records writes instead of touching hardware
#[derive(Default)]
pub struct MockTransport {
    pub writes: Mutex<Vec<String>>,
    pub write_attempts: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub staged: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn written(&self) -> Vec<String> {
        self.writes.lock().clone()
    }
}

impl Transport for MockTransport {
    fn port_name(&self) -> &str {
        "/dev/ttyMOCK0"
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.writes
            .lock()
            .push(String::from_utf8_lossy(data).into_owned());
        Ok(data.len())
    }

    fn drain_staged(&self) -> usize {
        self.staged.swap(0, Ordering::SeqCst)
    }

    fn items_in_buffer(&self) -> usize {
        self.staged.load(Ordering::SeqCst)
    }
}

/// Both ends of a fake serial line
#[derive(Default)]
pub struct MockWire {
    pub to_device: Mutex<Vec<u8>>,
    pub from_device: Mutex<VecDeque<u8>>,
}

impl MockWire {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bytes the host has written, as text
    pub fn sent(&self) -> String {
        String::from_utf8_lossy(&self.to_device.lock()).into_owned()
    }

    /// Queue bytes for the host to read
    pub fn reply(&self, text: &str) {
        self.from_device.lock().extend(text.as_bytes());
    }
}

/// Serial port backed by a [`MockWire`]
pub struct MockSerialPort {
    pub wire: Arc<MockWire>,
}

impl SerialPort for MockSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.wire.to_device.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut incoming = self.wire.from_device.lock();
        if incoming.is_empty() {
            drop(incoming);
            thread::sleep(Duration::from_millis(2));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(incoming.len());
        for (slot, byte) in buf.iter_mut().zip(incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> String {
        "/dev/ttyMOCK0".to_string()
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>> {
        Ok(Box::new(MockSerialPort {
            wire: self.wire.clone(),
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Event sink that remembers everything published to it
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HubEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every event so far, in publish order
    pub fn events(&self) -> Vec<HubEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: HubEvent) {
        self.events.lock().push(event);
    }
}

/// Ids of completion events, in publish order
pub fn completed_ids(sink: &RecordingSink, kind: CompletionKind) -> Vec<String> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            HubEvent::Command(result) if result.kind == kind => Some(result.id),
            _ => None,
        })
        .collect()
}

/// Passthrough line payloads, in publish order
pub fn lines(sink: &RecordingSink) -> Vec<String> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            HubEvent::Line(line) => Some(line.data),
            _ => None,
        })
        .collect()
}

/// Queue counts reported by wipe notifications
pub fn wipes(sink: &RecordingSink) -> Vec<usize> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            HubEvent::WipedQueue { queue_count, .. } => Some(queue_count),
            _ => None,
        })
        .collect()
}

/// Diagnostic texts, in publish order
pub fn diagnostics(sink: &RecordingSink) -> Vec<String> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            HubEvent::Diagnostic(text) => Some(text),
            _ => None,
        })
        .collect()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
