//! Scheduler lock
//!
//! The single process-wide critical section guarding every state
//! transition that affects scheduling or object signaling: signaled flags,
//! waiter registries, thread pinning, and current-thread bookkeeping.
//!
//! The lock is reentrant for the host thread driving the current core, so
//! a signal path entered while the lock is already held (for example a
//! port enqueue signaling its server endpoint) nests instead of
//! deadlocking. A hold count tracks the nesting depth.
//!
//! Acquisition yields a [`SchedulerLockGuard`]; the critical section ends
//! when the guard drops, so the lock is released on every exit path
//! including errors and early returns. Mutation methods elsewhere in the
//! crate take a `&SchedulerLockGuard` token, making "must hold the
//! scheduler lock" a compile-time obligation.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;

#[derive(Debug)]
struct LockInner {
    owner: Option<ThreadId>,
    holds: u32,
}

/// Process-wide, reentrant scheduling critical section.
#[derive(Debug)]
pub struct SchedulerLock {
    inner: Mutex<LockInner>,
    available: Condvar,
}

impl SchedulerLock {
    /// Creates an unheld scheduler lock.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockInner {
                owner: None,
                holds: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Enters the critical section, blocking while another host thread
    /// holds it. Re-entry from the holding thread nests.
    pub fn lock(&self) -> SchedulerLockGuard<'_> {
        let me = std::thread::current().id();
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");
        loop {
            match inner.owner {
                None => {
                    inner.owner = Some(me);
                    inner.holds = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    inner.holds += 1;
                    break;
                }
                Some(_) => {
                    inner = self
                        .available
                        .wait(inner)
                        .expect("scheduler lock poisoned");
                }
            }
        }
        SchedulerLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Returns true if the calling host thread currently holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        let inner = self.inner.lock().expect("scheduler lock poisoned");
        inner.owner == Some(std::thread::current().id())
    }

    /// Returns the current nesting depth (test helper).
    pub fn hold_count(&self) -> u32 {
        self.inner.lock().expect("scheduler lock poisoned").holds
    }
}

impl Default for SchedulerLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped critical section; releases one hold on drop.
///
/// Not `Send`: the hold must be released by the thread that acquired it.
pub struct SchedulerLockGuard<'a> {
    lock: &'a SchedulerLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SchedulerLockGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.lock.inner.lock().expect("scheduler lock poisoned");
        inner.holds -= 1;
        if inner.holds == 0 {
            inner.owner = None;
            self.lock.available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_and_release() {
        let lock = SchedulerLock::new();
        {
            let _guard = lock.lock();
            assert!(lock.is_held_by_current_thread());
            assert_eq!(lock.hold_count(), 1);
        }
        assert!(!lock.is_held_by_current_thread());
        assert_eq!(lock.hold_count(), 0);
    }

    #[test]
    fn test_reentrant_on_same_thread() {
        let lock = SchedulerLock::new();
        let _outer = lock.lock();
        {
            let _inner = lock.lock();
            assert_eq!(lock.hold_count(), 2);
        }
        assert_eq!(lock.hold_count(), 1);
        assert!(lock.is_held_by_current_thread());
    }

    #[test]
    fn test_released_on_early_return() {
        let lock = SchedulerLock::new();
        let attempt = || -> Result<(), ()> {
            let _guard = lock.lock();
            Err(())
        };
        assert!(attempt().is_err());
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn test_excludes_other_threads() {
        let lock = Arc::new(SchedulerLock::new());
        let guard = lock.lock();

        let lock2 = Arc::clone(&lock);
        let handle = std::thread::spawn(move || {
            // Blocks until the main thread releases, then succeeds.
            let _guard = lock2.lock();
            true
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!handle.is_finished());

        drop(guard);
        assert!(handle.join().unwrap());
    }
}
