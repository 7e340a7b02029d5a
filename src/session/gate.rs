//! Callback gate
//!
//! Counts engine callbacks currently running inside a session and lets the
//! session wait for them to finish once it has been closed. A closed gate
//! refuses new callbacks, so nothing touches the buffer or the sink after
//! shutdown has drained the gate.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    closed: bool,
    in_flight: usize,
}

/// Entry counter with a close-and-drain barrier
#[derive(Debug, Default)]
pub(crate) struct CallbackGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

/// Proof that a callback is inside the gate; leaving is dropping it
#[derive(Debug)]
pub(crate) struct CallbackPass<'a> {
    gate: &'a CallbackGate,
}

impl CallbackGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter the gate, or `None` once it has been closed
    pub(crate) fn enter(&self) -> Option<CallbackPass<'_>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.in_flight += 1;
        Some(CallbackPass { gate: self })
    }

    /// Close the gate and wait for running callbacks to leave.
    ///
    /// Returns `false` if callbacks were still running when `timeout`
    /// elapsed.
    pub(crate) fn close(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.closed = true;

        while state.in_flight > 0 {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight == 0;
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }
}

impl Drop for CallbackPass<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.idle.notify_all();
        }
    }
}
