//! Wait engine
//!
//! The core of WaitSynchronization: scan, register, park, decide, clean
//! up. The caller resolves handles to objects first; this module only
//! sees pre-validated waitable objects.
//!
//! The `objects` slice the caller passes doubles as the pinning
//! references: every object stays alive for the full duration of the
//! wait, even if all of its handles are closed mid-wait.
//!
//! Lost wakeups cannot happen: the initial scan and the waiter
//! registration happen under one scheduler-lock hold, and a signal
//! delivered after release lands in the thread's wait slot where park
//! consumes it.

use crate::object::ObjectRef;
use crate::sched_lock::{SchedulerLock, SchedulerLockGuard};
use crate::thread::{EmuThread, ParkResult, WakeReason};
use std::sync::Arc;
use svc_api::{SvcError, SvcResult, WaitTimeout};

/// Returns the lowest input index whose object is currently signaled.
fn first_signaled(objects: &[ObjectRef], sl: &SchedulerLockGuard) -> Option<usize> {
    objects
        .iter()
        .position(|object| object.waitable().map_or(false, |sync| sync.is_signaled(sl)))
}

/// Blocks `thread` until one of `objects` signals, the wait is
/// cancelled, or `timeout` elapses.
///
/// Returns the lowest signaled input index. The tie-break between
/// simultaneously signaled objects is their order of appearance in the
/// call. `Err(TimedOut)` for an elapsed (or zero) timeout,
/// `Err(Cancelled)` when CancelSynchronization reached the wait first.
///
/// On every exit path the thread is unregistered from all objects and
/// returned to `Runnable`; no registration or reference outlives the
/// call.
pub(crate) fn wait_for_objects(
    sched: &SchedulerLock,
    thread: &Arc<EmuThread>,
    objects: &[ObjectRef],
    timeout: WaitTimeout,
) -> SvcResult<usize> {
    let deadline;
    {
        let sl = sched.lock();
        if let Some(index) = first_signaled(objects, &sl) {
            return Ok(index);
        }
        if timeout.is_zero() {
            return Err(SvcError::TimedOut);
        }

        thread.begin_wait(&sl);
        for object in objects {
            if let Some(sync) = object.waitable() {
                sync.register_waiter(Arc::clone(thread), &sl);
            }
        }
        deadline = timeout.deadline();
    }

    let outcome = loop {
        match thread.park(deadline) {
            ParkResult::TimedOut => break Err(SvcError::TimedOut),
            ParkResult::Woken(WakeReason::Cancelled) => break Err(SvcError::Cancelled),
            ParkResult::Woken(WakeReason::Signaled) => {
                let sl = sched.lock();
                if let Some(index) = first_signaled(objects, &sl) {
                    break Ok(index);
                }
                // The signal was cleared before this thread observed it;
                // keep waiting.
            }
        }
    };

    let sl = sched.lock();
    for object in objects {
        if let Some(sync) = object.waitable() {
            sync.unregister_waiter(thread, &sl);
        }
    }
    thread.finish_wait(&sl);
    outcome
}
