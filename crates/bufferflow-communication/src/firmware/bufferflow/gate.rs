//! Pause/resume gate
//!
//! A paused flag plus a single-slot release signal, both guarded by one
//! lock. A sender that finds the gate paused clears out any stale signal
//! and then waits for the next release; whoever unpauses the gate decides
//! whether that sender resumes or abandons its command.

use parking_lot::{Condvar, Mutex};

/// What a blocked sender is told when the gate opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    /// Proceed and send the command that triggered the wait
    Resume = 1,
    /// Do not send; the queue has been wiped
    Wipe = 2,
}

#[derive(Debug)]
struct GateState {
    paused: bool,
    signal: Option<ReleaseKind>,
}

/// Thread-safe paused flag with selective release
#[derive(Debug)]
pub struct PauseGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl PauseGate {
    /// Create an open (unpaused) gate
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                paused: false,
                signal: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Close the gate; the next sender to check it will block
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    /// Open the gate and hand `release` to one waiter
    ///
    /// Never blocks. When nobody is waiting the signal stays in the slot
    /// until the next wait drains it.
    pub fn unpause(&self, release: ReleaseKind) {
        let mut state = self.state.lock();
        state.paused = false;
        state.signal = Some(release);
        self.released.notify_one();
    }

    /// Set the paused flag, releasing with `release` when opening
    pub fn set_paused(&self, paused: bool, release: ReleaseKind) {
        if paused {
            self.pause();
        } else {
            self.unpause(release);
        }
    }

    /// Open the gate only if it is currently paused
    ///
    /// Returns true when a release was issued.
    pub fn unpause_if_paused(&self, release: ReleaseKind) -> bool {
        let mut state = self.state.lock();
        if !state.paused {
            return false;
        }
        state.paused = false;
        state.signal = Some(release);
        self.released.notify_one();
        true
    }

    /// Whether the gate is paused
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Close the gate on behalf of the caller and discard any stale release
    ///
    /// Pair with [`PauseGate::wait_after_pause`]: a release issued after
    /// this call is kept for the caller even if it lands before the wait.
    pub fn pause_and_drain(&self) {
        let mut state = self.state.lock();
        state.paused = true;
        if let Some(stale) = state.signal.take() {
            tracing::trace!("Discarded stale gate signal {:?} on pause", stale);
        }
    }

    /// Discard a pending release left over from an earlier cycle
    ///
    /// Returns the number of signals consumed (0 or 1).
    pub fn drain_signal(&self) -> usize {
        let drained = self.state.lock().signal.take();
        usize::from(drained.is_some())
    }

    /// Block while the gate is paused
    ///
    /// Returns `None` immediately if the gate is open. Otherwise drains any
    /// stale signal and waits for the next release. The paused check, the
    /// drain and the wait happen under one lock so a release cannot slip in
    /// between them.
    pub fn wait_for_release(&self) -> Option<ReleaseKind> {
        let mut state = self.state.lock();
        if !state.paused {
            return None;
        }

        if let Some(stale) = state.signal.take() {
            tracing::trace!("Discarded stale gate signal {:?} before blocking", stale);
        }

        loop {
            if let Some(release) = state.signal.take() {
                return Some(release);
            }
            self.released.wait(&mut state);
        }
    }

    /// Wait for the release that follows [`PauseGate::pause_and_drain`]
    ///
    /// Returns `None` only if the gate was reopened without a signal.
    pub fn wait_after_pause(&self) -> Option<ReleaseKind> {
        let mut state = self.state.lock();
        loop {
            if let Some(release) = state.signal.take() {
                return Some(release);
            }
            if !state.paused {
                return None;
            }
            self.released.wait(&mut state);
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_open_gate_does_not_block() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        assert_eq!(gate.wait_for_release(), None);
    }

    #[test]
    fn test_release_reaches_waiter() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_for_release())
        };

        thread::sleep(Duration::from_millis(50));
        gate.unpause(ReleaseKind::Wipe);

        assert_eq!(waiter.join().expect("waiter"), Some(ReleaseKind::Wipe));
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_stale_signal_is_drained_before_wait() {
        let gate = Arc::new(PauseGate::new());

        // Release with nobody waiting leaves a signal behind.
        gate.unpause(ReleaseKind::Wipe);
        gate.pause();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_for_release())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        gate.unpause(ReleaseKind::Resume);
        assert_eq!(waiter.join().expect("waiter"), Some(ReleaseKind::Resume));
    }

    #[test]
    fn test_release_before_wait_is_kept_after_own_pause() {
        let gate = PauseGate::new();
        gate.unpause(ReleaseKind::Resume);

        gate.pause_and_drain();
        assert!(gate.is_paused());
        gate.unpause(ReleaseKind::Wipe);

        assert_eq!(gate.wait_after_pause(), Some(ReleaseKind::Wipe));
    }

    #[test]
    fn test_wait_after_pause_blocks_until_release() {
        let gate = Arc::new(PauseGate::new());
        gate.pause_and_drain();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_after_pause())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        gate.unpause(ReleaseKind::Resume);
        assert_eq!(waiter.join().expect("waiter"), Some(ReleaseKind::Resume));
    }

    #[test]
    fn test_drain_signal_never_blocks() {
        let gate = PauseGate::new();
        assert_eq!(gate.drain_signal(), 0);
        gate.unpause(ReleaseKind::Resume);
        assert_eq!(gate.drain_signal(), 1);
        assert_eq!(gate.drain_signal(), 0);
    }

    #[test]
    fn test_unpause_if_paused() {
        let gate = PauseGate::new();
        assert!(!gate.unpause_if_paused(ReleaseKind::Resume));
        assert_eq!(gate.drain_signal(), 0);

        gate.set_paused(true, ReleaseKind::Resume);
        assert!(gate.unpause_if_paused(ReleaseKind::Resume));
        assert!(!gate.is_paused());
    }
}
