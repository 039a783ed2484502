//! Emulated threads
//!
//! An [`EmuThread`] models one guest thread. Blocking is an explicit state
//! machine (`Runnable → Waiting → Runnable`, or `Terminated`) driven by the
//! wait engine; the only place the backing host thread actually parks is
//! [`EmuThread::park`], which is reached exclusively through
//! WaitSynchronization.
//!
//! Wake delivery is decoupled from wake consumption: a signaler or
//! canceler records a [`WakeReason`] on the thread's wait slot (under the
//! scheduler lock) and notifies; the parked host thread consumes the
//! reason and lets the wait engine decide the outcome. A delivered
//! cancellation overwrites a not-yet-consumed signal, so cancellation
//! takes precedence over a near-simultaneous signal.
//!
//! Threads are themselves waitable kernel objects, signaled on
//! termination. They also carry the interrupt flag consulted by the
//! preemption-time unpinning path.

use crate::object::KernelObject;
use crate::sched_lock::{SchedulerLock, SchedulerLockGuard};
use crate::sync::SyncState;
use kernel_types::ObjectId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Scheduling state of an emulated thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Eligible to run.
    Runnable,
    /// Suspended in WaitSynchronization.
    Waiting,
    /// Exited; the thread object stays alive while referenced.
    Terminated,
}

/// Why a parked wait was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeReason {
    /// A registered object transitioned to signaled.
    Signaled,
    /// CancelSynchronization targeted this thread's wait.
    Cancelled,
}

/// Result of one park attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParkResult {
    Woken(WakeReason),
    TimedOut,
}

#[derive(Debug)]
struct WaitSlot {
    /// True from registration until the wait engine finishes cleanup.
    waiting: bool,
    /// Delivered but not yet consumed wake reason.
    wake: Option<WakeReason>,
}

/// One emulated guest thread.
#[derive(Debug)]
pub struct EmuThread {
    id: ObjectId,
    name: String,
    sched: Arc<SchedulerLock>,
    state: Mutex<ThreadState>,
    slot: Mutex<WaitSlot>,
    wake_cond: Condvar,
    interrupt_flag: AtomicBool,
    sync: SyncState,
}

impl EmuThread {
    /// Creates a runnable thread.
    pub fn new(sched: Arc<SchedulerLock>, name: String) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::new(),
            name,
            sched,
            state: Mutex::new(ThreadState::Runnable),
            slot: Mutex::new(WaitSlot {
                waiting: false,
                wake: None,
            }),
            wake_cond: Condvar::new(),
            interrupt_flag: AtomicBool::new(false),
            sync: SyncState::new(),
        })
    }

    /// Returns the thread's scheduling state.
    pub fn state(&self) -> ThreadState {
        *self.state.lock().expect("thread state poisoned")
    }

    /// Returns true while the thread has a pending wait.
    pub fn is_waiting(&self) -> bool {
        self.slot.lock().expect("wait slot poisoned").waiting
    }

    /// Arms the wait slot and moves the thread to `Waiting`.
    pub(crate) fn begin_wait(&self, _sl: &SchedulerLockGuard) {
        *self.state.lock().expect("thread state poisoned") = ThreadState::Waiting;
        let mut slot = self.slot.lock().expect("wait slot poisoned");
        slot.waiting = true;
        slot.wake = None;
    }

    /// Disarms the wait slot and moves the thread back to `Runnable`.
    ///
    /// Any undelivered wake is discarded so it cannot leak into a later
    /// wait.
    pub(crate) fn finish_wait(&self, _sl: &SchedulerLockGuard) {
        let mut slot = self.slot.lock().expect("wait slot poisoned");
        slot.waiting = false;
        slot.wake = None;
        drop(slot);
        let mut state = self.state.lock().expect("thread state poisoned");
        if *state == ThreadState::Waiting {
            *state = ThreadState::Runnable;
        }
    }

    /// Records a wake reason for a pending wait and notifies the parked
    /// host thread. No-op when no wait is pending.
    ///
    /// `Cancelled` overwrites a pending `Signaled`; `Signaled` never
    /// overwrites anything.
    pub(crate) fn deliver_wake(&self, reason: WakeReason, _sl: &SchedulerLockGuard) {
        let mut slot = self.slot.lock().expect("wait slot poisoned");
        if !slot.waiting {
            return;
        }
        match reason {
            WakeReason::Cancelled => slot.wake = Some(WakeReason::Cancelled),
            WakeReason::Signaled => {
                if slot.wake.is_none() {
                    slot.wake = Some(WakeReason::Signaled);
                }
            }
        }
        drop(slot);
        self.wake_cond.notify_all();
    }

    /// Cancels a pending wait. No-op when the thread is not waiting.
    pub fn cancel_wait(&self, sl: &SchedulerLockGuard) {
        self.deliver_wake(WakeReason::Cancelled, sl);
    }

    /// Parks the calling host thread until a wake is delivered or the
    /// deadline passes. `None` means wait forever.
    ///
    /// Consumes the delivered wake reason; the wait slot stays armed so
    /// the wait engine can re-park after a retracted signal.
    pub(crate) fn park(&self, deadline: Option<std::time::Instant>) -> ParkResult {
        let mut slot = self.slot.lock().expect("wait slot poisoned");
        loop {
            if let Some(reason) = slot.wake.take() {
                return ParkResult::Woken(reason);
            }
            match deadline {
                None => {
                    slot = self.wake_cond.wait(slot).expect("wait slot poisoned");
                }
                Some(deadline) => {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return ParkResult::TimedOut;
                    }
                    let (next, _) = self
                        .wake_cond
                        .wait_timeout(slot, deadline - now)
                        .expect("wait slot poisoned");
                    slot = next;
                }
            }
        }
    }

    /// Sets the interrupt flag (pinning entry).
    pub fn set_interrupt_flag(&self) {
        self.interrupt_flag.store(true, Ordering::SeqCst);
    }

    /// Clears the interrupt flag (preemption-time unpinning).
    pub fn clear_interrupt_flag(&self) {
        self.interrupt_flag.store(false, Ordering::SeqCst);
    }

    /// Returns the interrupt flag.
    pub fn interrupt_flag(&self) -> bool {
        self.interrupt_flag.load(Ordering::SeqCst)
    }

    /// Marks the thread terminated and signals anyone waiting on it.
    pub fn terminate(&self) {
        let sl = self.sched.lock();
        *self.state.lock().expect("thread state poisoned") = ThreadState::Terminated;
        self.sync.signal(&sl);
    }
}

impl KernelObject for EmuThread {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Thread"
    }

    fn object_name(&self) -> String {
        self.name.clone()
    }

    fn waitable(&self) -> Option<&SyncState> {
        Some(&self.sync)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Arc<SchedulerLock>, Arc<EmuThread>) {
        let sched = Arc::new(SchedulerLock::new());
        let thread = EmuThread::new(Arc::clone(&sched), "t".to_string());
        (sched, thread)
    }

    #[test]
    fn test_new_thread_is_runnable() {
        let (_, thread) = fixture();
        assert_eq!(thread.state(), ThreadState::Runnable);
        assert!(!thread.is_waiting());
    }

    #[test]
    fn test_begin_finish_wait_state_machine() {
        let (sched, thread) = fixture();
        let sl = sched.lock();

        thread.begin_wait(&sl);
        assert_eq!(thread.state(), ThreadState::Waiting);
        assert!(thread.is_waiting());

        thread.finish_wait(&sl);
        assert_eq!(thread.state(), ThreadState::Runnable);
        assert!(!thread.is_waiting());
    }

    #[test]
    fn test_park_consumes_delivered_wake() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.begin_wait(&sl);
            thread.deliver_wake(WakeReason::Signaled, &sl);
        }
        assert_eq!(thread.park(None), ParkResult::Woken(WakeReason::Signaled));
    }

    #[test]
    fn test_park_times_out() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.begin_wait(&sl);
        }
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(10);
        assert_eq!(thread.park(Some(deadline)), ParkResult::TimedOut);
    }

    #[test]
    fn test_cancel_overwrites_pending_signal() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.begin_wait(&sl);
            thread.deliver_wake(WakeReason::Signaled, &sl);
            thread.deliver_wake(WakeReason::Cancelled, &sl);
        }
        assert_eq!(thread.park(None), ParkResult::Woken(WakeReason::Cancelled));
    }

    #[test]
    fn test_signal_does_not_overwrite_cancel() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.begin_wait(&sl);
            thread.deliver_wake(WakeReason::Cancelled, &sl);
            thread.deliver_wake(WakeReason::Signaled, &sl);
        }
        assert_eq!(thread.park(None), ParkResult::Woken(WakeReason::Cancelled));
    }

    #[test]
    fn test_wake_without_pending_wait_is_dropped() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.deliver_wake(WakeReason::Cancelled, &sl);
            thread.begin_wait(&sl);
        }
        // The pre-wait cancellation must not satisfy the new wait.
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(10);
        assert_eq!(thread.park(Some(deadline)), ParkResult::TimedOut);
    }

    #[test]
    fn test_cross_thread_wake() {
        let (sched, thread) = fixture();
        {
            let sl = sched.lock();
            thread.begin_wait(&sl);
        }

        let sched2 = Arc::clone(&sched);
        let thread2 = Arc::clone(&thread);
        let waker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            let sl = sched2.lock();
            thread2.deliver_wake(WakeReason::Signaled, &sl);
        });

        assert_eq!(thread.park(None), ParkResult::Woken(WakeReason::Signaled));
        waker.join().unwrap();
    }

    #[test]
    fn test_interrupt_flag() {
        let (_, thread) = fixture();
        assert!(!thread.interrupt_flag());
        thread.set_interrupt_flag();
        assert!(thread.interrupt_flag());
        thread.clear_interrupt_flag();
        assert!(!thread.interrupt_flag());
    }

    #[test]
    fn test_terminate_signals_waiters() {
        let (sched, thread) = fixture();
        thread.terminate();
        assert_eq!(thread.state(), ThreadState::Terminated);
        let sl = sched.lock();
        assert!(thread.waitable().unwrap().is_signaled(&sl));
    }
}
