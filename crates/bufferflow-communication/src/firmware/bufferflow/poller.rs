//! Background status polling
//!
//! Writes the dialect's status query straight to the transport on a fixed
//! interval, bypassing the command queue and the gate. Runs on its own
//! thread with a single-threaded tokio runtime driving the ticker.

use crate::communication::Transport;
use bufferflow_core::{ConnectionError, EventSink, HubEvent, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Handle to a running status poller
pub struct StatusPoller {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    /// Start polling `transport` with `query` every `interval`
    ///
    /// The first query goes out one interval after start. On a write
    /// failure the poller stops ticking and publishes a diagnostic; it does
    /// not close the connection.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        query: String,
        interval: Duration,
    ) -> Result<Self> {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let port = transport.port_name().to_string();

        let handle = thread::Builder::new()
            .name(format!("status-poll {}", port))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Status poller for {} could not start: {}", port, e);
                        return;
                    }
                };

                runtime.block_on(async move {
                    let mut ticker = time::interval_at(Instant::now() + interval, interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                match transport.write(query.as_bytes()) {
                                    Ok(written) => {
                                        tracing::trace!("Wrote {} bytes to {}: {:?}", written, port, query);
                                    }
                                    Err(e) => {
                                        let err = ConnectionError::WriteFailed {
                                            port: port.clone(),
                                            reason: e.to_string(),
                                        };
                                        tracing::error!("{}. Stopping status poll.", err);
                                        sink.publish(HubEvent::Diagnostic(err.to_string()));
                                        break;
                                    }
                                }
                            }
                            _ = stop_rx.recv() => return,
                        }
                    }

                    // Ticker is dead; stay parked until told to stop.
                    let _ = stop_rx.recv().await;
                });
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Whether the poller thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the poller and wait for its thread to exit
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Status poller thread panicked");
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("running", &self.is_running())
            .finish()
    }
}
