//! Emulated processes
//!
//! A [`Process`] owns the handle table its threads resolve handles
//! through, plus the per-core thread pinning slots consulted by the
//! preemption-state call. Processes are waitable and become signaled on
//! termination; ResetSignal can clear that state.

use crate::handle_table::HandleTable;
use crate::object::KernelObject;
use crate::sched_lock::{SchedulerLock, SchedulerLockGuard};
use crate::sync::SyncState;
use crate::thread::EmuThread;
use kernel_types::{CoreId, ObjectId};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default handle-table capacity for a new process.
pub const DEFAULT_HANDLE_CAPACITY: usize = 1024;

/// One emulated guest process.
pub struct Process {
    id: ObjectId,
    name: String,
    sched: Arc<SchedulerLock>,
    handle_table: Mutex<HandleTable>,
    /// One pinning slot per core; a pinned thread runs exception
    /// handling and must not be preempted until unpinned.
    pinned: Mutex<Vec<Option<Arc<EmuThread>>>>,
    sync: SyncState,
}

impl Process {
    /// Creates a process with an empty handle table and no pinned
    /// threads.
    pub fn new(sched: Arc<SchedulerLock>, name: String, core_count: usize) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::new(),
            name,
            sched,
            handle_table: Mutex::new(HandleTable::new(DEFAULT_HANDLE_CAPACITY)),
            pinned: Mutex::new(vec![None; core_count]),
            sync: SyncState::new(),
        })
    }

    /// Locks and returns the process handle table.
    pub fn handle_table(&self) -> MutexGuard<'_, HandleTable> {
        self.handle_table.lock().expect("handle table poisoned")
    }

    /// Pins a thread to a core and raises its interrupt flag.
    pub fn pin_thread(&self, core: CoreId, thread: Arc<EmuThread>, _sl: &SchedulerLockGuard) {
        thread.set_interrupt_flag();
        let mut pinned = self.pinned.lock().expect("pin slots poisoned");
        pinned[core.0] = Some(thread);
    }

    /// Unpins whatever thread is pinned to a core.
    pub fn unpin_thread(&self, core: CoreId, _sl: &SchedulerLockGuard) {
        let mut pinned = self.pinned.lock().expect("pin slots poisoned");
        pinned[core.0] = None;
    }

    /// Returns the thread pinned to a core, if any.
    pub fn pinned_thread(&self, core: CoreId, _sl: &SchedulerLockGuard) -> Option<Arc<EmuThread>> {
        let pinned = self.pinned.lock().expect("pin slots poisoned");
        pinned.get(core.0).and_then(Clone::clone)
    }

    /// Clears the process's signaled state (ResetSignal target).
    pub fn reset(&self, sl: &SchedulerLockGuard) {
        self.sync.clear(sl);
    }

    /// Terminates the process: releases every handle, then signals
    /// anyone waiting on the process object.
    pub fn terminate(&self) {
        self.handle_table().clear();
        let sl = self.sched.lock();
        self.sync.signal(&sl);
    }
}

impl KernelObject for Process {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Process"
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
    use crate::event::Event;

    fn fixture() -> (Arc<SchedulerLock>, Arc<Process>) {
        let sched = Arc::new(SchedulerLock::new());
        let process = Process::new(Arc::clone(&sched), "proc".to_string(), 4);
        (sched, process)
    }

    #[test]
    fn test_handle_table_round_trip() {
        let (sched, process) = fixture();
        let event = Event::new(Arc::clone(&sched), "evt".to_string());

        let handle = process.handle_table().add(event.clone()).unwrap();
        let resolved = process.handle_table().get(handle).unwrap();
        assert_eq!(resolved.id(), event.id());
    }

    #[test]
    fn test_pin_and_unpin() {
        let (sched, process) = fixture();
        let thread = EmuThread::new(Arc::clone(&sched), "t".to_string());
        let sl = sched.lock();

        process.pin_thread(CoreId(1), Arc::clone(&thread), &sl);
        assert!(thread.interrupt_flag());
        let pinned = process.pinned_thread(CoreId(1), &sl).unwrap();
        assert!(Arc::ptr_eq(&pinned, &thread));
        assert!(process.pinned_thread(CoreId(0), &sl).is_none());

        process.unpin_thread(CoreId(1), &sl);
        assert!(process.pinned_thread(CoreId(1), &sl).is_none());
    }

    #[test]
    fn test_terminate_releases_handles_and_signals() {
        let (sched, process) = fixture();
        let event = Event::new(Arc::clone(&sched), "evt".to_string());
        let before = Arc::strong_count(&event);
        process.handle_table().add(event.clone()).unwrap();

        process.terminate();
        assert_eq!(Arc::strong_count(&event), before);
        assert!(process.handle_table().is_empty());

        let sl = sched.lock();
        assert!(process.waitable().unwrap().is_signaled(&sl));
    }

    #[test]
    fn test_reset_clears_signaled_state() {
        let (sched, process) = fixture();
        process.terminate();

        let sl = sched.lock();
        process.reset(&sl);
        assert!(!process.waitable().unwrap().is_signaled(&sl));
    }
}
