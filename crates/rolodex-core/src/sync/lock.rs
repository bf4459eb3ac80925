//! Non-blocking single-flight guard shared by every sync entry point.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide (or engine-wide) single-flight lock.
///
/// Clones share the same underlying mutex, so one lock can be handed to
/// several engines that must never sync concurrently.
#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of a run; dropping it releases the lock
#[derive(Debug)]
pub struct SyncLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire without waiting. `None` when a run is already in flight.
    pub fn try_acquire(&self) -> Option<SyncLockGuard> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| SyncLockGuard { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
