//! Single-slot asynchronous wait/notify gate.
//!
//! A [`SignalGate`] is either open or closed. Closing it takes the single
//! permit away; [`SignalGate::wait_open`] suspends until somebody gives the
//! permit back with [`SignalGate::open`], and then keeps it, so the gate is
//! closed again for the next waiter. One `open` releases at most one waiter.
//!
//! Opening a gate nobody is waiting on is not lost: the permit stays
//! available and the next `wait_open` returns immediately.

use parking_lot::Mutex;
use tokio::sync::{Semaphore, TryAcquireError};

/// Reusable two-state gate backed by a single semaphore permit.
#[derive(Debug)]
pub struct SignalGate {
    permit: Semaphore,
    /// Serializes open/close so only one transition is in flight.
    transition: Mutex<()>,
}

impl SignalGate {
    /// Create a new gate in the open state.
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(1),
            transition: Mutex::new(()),
        }
    }

    /// Create a gate that starts closed.
    pub fn closed() -> Self {
        let gate = Self::new();
        gate.close();
        gate
    }

    /// Move the gate from open to closed. Never suspends.
    ///
    /// Callers only close a gate they know to be open; closing a closed or
    /// shut-down gate does nothing.
    pub fn close(&self) {
        let _transition = self.transition.lock();
        match self.permit.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => {
                tracing::trace!("close requested on a gate that is already closed");
            }
            Err(TryAcquireError::Closed) => {}
        }
    }

    /// Wait until the gate is open, then take the permit.
    ///
    /// Returns immediately if the gate is open. Each call is a fresh wait.
    pub async fn wait_open(&self) {
        // Acquire only fails once the gate has been shut down, which counts
        // as permanently open.
        if let Ok(permit) = self.permit.acquire().await {
            permit.forget();
        }
    }

    /// Open the gate, releasing one suspended waiter (or the next to arrive).
    pub fn open(&self) {
        let _transition = self.transition.lock();
        if self.permit.available_permits() == 0 {
            self.permit.add_permits(1);
        }
    }

    /// Open the gate for good: every current and future waiter resumes.
    pub fn shutdown(&self) {
        let _transition = self.transition.lock();
        self.permit.close();
    }

    /// Check whether a `wait_open` call would return without suspending.
    pub fn is_open(&self) -> bool {
        self.permit.is_closed() || self.permit.available_permits() > 0
    }

    /// Check whether the gate has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.permit.is_closed()
    }
}

impl Default for SignalGate {
    fn default() -> Self {
        Self::new()
    }
}
