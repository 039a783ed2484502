//! Synchronization state
//!
//! [`SyncState`] is the capability mixed into kernel objects that can be
//! waited on: a signaled flag plus an ordered registry of waiting threads.
//! Every mutation takes a [`SchedulerLockGuard`] token, so signaling and
//! waiter bookkeeping are linearized by the scheduler lock and a waking
//! decision always observes a fully applied prior mutation.
//!
//! Registry entries own a reference to the waiting thread, and the wait
//! engine holds a pinning reference to the object for the duration of the
//! wait, so neither side can be destroyed while a wait is in flight.
//!
//! Signaling does not consume the signaled state: objects here have
//! manual-clear semantics (`clear` / the ResetSignal call).

use crate::sched_lock::SchedulerLockGuard;
use crate::thread::{EmuThread, WakeReason};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct SyncInner {
    signaled: bool,
    waiters: Vec<Arc<EmuThread>>,
}

/// Signaled/not-signaled state plus the waiter registry.
#[derive(Debug)]
pub struct SyncState {
    inner: Mutex<SyncInner>,
}

impl SyncState {
    /// Creates a not-signaled state with no waiters.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SyncInner {
                signaled: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Returns the signaled flag.
    pub fn is_signaled(&self, _sl: &SchedulerLockGuard) -> bool {
        self.inner.lock().expect("sync state poisoned").signaled
    }

    /// Marks the object signaled and wakes every registered waiter.
    ///
    /// Waiters stay registered; the wait engine unregisters them on its
    /// own exit path.
    pub fn signal(&self, sl: &SchedulerLockGuard) {
        let waiters = {
            let mut inner = self.inner.lock().expect("sync state poisoned");
            inner.signaled = true;
            inner.waiters.clone()
        };
        for waiter in waiters {
            waiter.deliver_wake(WakeReason::Signaled, sl);
        }
    }

    /// Clears the signaled flag. Waiters are unaffected.
    pub fn clear(&self, _sl: &SchedulerLockGuard) {
        self.inner.lock().expect("sync state poisoned").signaled = false;
    }

    /// Appends a waiting thread to the registry.
    pub(crate) fn register_waiter(&self, thread: Arc<EmuThread>, _sl: &SchedulerLockGuard) {
        self.inner
            .lock()
            .expect("sync state poisoned")
            .waiters
            .push(thread);
    }

    /// Removes a waiting thread from the registry, releasing the
    /// registry's reference to it.
    pub(crate) fn unregister_waiter(&self, thread: &Arc<EmuThread>, _sl: &SchedulerLockGuard) {
        self.inner
            .lock()
            .expect("sync state poisoned")
            .waiters
            .retain(|waiter| !Arc::ptr_eq(waiter, thread));
    }

    /// Returns the number of registered waiters (test helper).
    pub fn waiter_count(&self, _sl: &SchedulerLockGuard) -> usize {
        self.inner.lock().expect("sync state poisoned").waiters.len()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched_lock::SchedulerLock;

    fn test_thread(sched: &Arc<SchedulerLock>) -> Arc<EmuThread> {
        EmuThread::new(Arc::clone(sched), "waiter".to_string())
    }

    #[test]
    fn test_starts_not_signaled() {
        let sched = Arc::new(SchedulerLock::new());
        let sync = SyncState::new();
        let sl = sched.lock();
        assert!(!sync.is_signaled(&sl));
    }

    #[test]
    fn test_signal_and_clear() {
        let sched = Arc::new(SchedulerLock::new());
        let sync = SyncState::new();
        let sl = sched.lock();

        sync.signal(&sl);
        assert!(sync.is_signaled(&sl));

        // Signaled state is sticky until cleared.
        assert!(sync.is_signaled(&sl));

        sync.clear(&sl);
        assert!(!sync.is_signaled(&sl));
    }

    #[test]
    fn test_register_unregister_waiter() {
        let sched = Arc::new(SchedulerLock::new());
        let sync = SyncState::new();
        let thread = test_thread(&sched);
        let sl = sched.lock();

        sync.register_waiter(Arc::clone(&thread), &sl);
        assert_eq!(sync.waiter_count(&sl), 1);

        sync.unregister_waiter(&thread, &sl);
        assert_eq!(sync.waiter_count(&sl), 0);
    }

    #[test]
    fn test_registry_holds_thread_reference() {
        let sched = Arc::new(SchedulerLock::new());
        let sync = SyncState::new();
        let thread = test_thread(&sched);
        let sl = sched.lock();

        let before = Arc::strong_count(&thread);
        sync.register_waiter(Arc::clone(&thread), &sl);
        assert_eq!(Arc::strong_count(&thread), before + 1);

        sync.unregister_waiter(&thread, &sl);
        assert_eq!(Arc::strong_count(&thread), before);
    }

    #[test]
    fn test_unregister_absent_waiter_is_noop() {
        let sched = Arc::new(SchedulerLock::new());
        let sync = SyncState::new();
        let thread = test_thread(&sched);
        let sl = sched.lock();

        sync.unregister_waiter(&thread, &sl);
        assert_eq!(sync.waiter_count(&sl), 0);
    }
}
