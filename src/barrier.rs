//! One-shot startup rendezvous for workers and the orchestrator.

use crate::error::{FairnessError, FairnessResult};
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error};

#[derive(Debug)]
struct BarrierState {
    remaining: usize,
    failure: Option<String>,
}

/// Releases every participant once all of them have registered.
///
/// Unlike `std::sync::Barrier`, a participant that cannot get ready (a
/// worker whose CPU pinning failed) can [`abort`](StartupBarrier::abort) the
/// rendezvous, which wakes everyone with an error instead of leaving them
/// blocked forever.
#[derive(Debug)]
pub struct StartupBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl StartupBarrier {
    /// Barrier expecting `participants` registrations.
    pub fn new(participants: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                remaining: participants,
                failure: None,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        // The state is two plain fields, a panicking holder cannot leave it torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register and block until all participants have registered.
    ///
    /// The last registrant wakes everyone. Returns an error if any
    /// participant aborted, either before or while this caller waited.
    pub fn register_and_wait(&self) -> FairnessResult<()> {
        let mut state = self.lock();
        if let Some(reason) = &state.failure {
            return Err(FairnessError::StartupAborted(reason.clone()));
        }

        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            debug!(operation = "startup_barrier", "All participants registered");
            self.released.notify_all();
            return Ok(());
        }

        while state.remaining > 0 && state.failure.is_none() {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        match &state.failure {
            Some(reason) => Err(FairnessError::StartupAborted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Give up on startup and release every waiter with an error.
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(operation = "startup_barrier", reason = %reason, "Startup aborted");
        let mut state = self.lock();
        if state.failure.is_none() {
            state.failure = Some(reason);
        }
        self.released.notify_all();
    }

    /// Participants that have not registered yet.
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }
}
