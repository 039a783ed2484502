//! Events
//!
//! The simplest waitable object: a manually signaled, manually cleared
//! flag. Signaling wakes every registered waiter and the state stays
//! signaled until [`Event::clear`] or a ResetSignal call clears it.

use crate::object::KernelObject;
use crate::sched_lock::SchedulerLock;
use crate::sync::SyncState;
use kernel_types::ObjectId;
use std::any::Any;
use std::sync::Arc;

/// Manual-clear signaling object.
#[derive(Debug)]
pub struct Event {
    id: ObjectId,
    name: String,
    sched: Arc<SchedulerLock>,
    sync: SyncState,
}

impl Event {
    /// Creates a not-signaled event.
    pub fn new(sched: Arc<SchedulerLock>, name: String) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::new(),
            name,
            sched,
            sync: SyncState::new(),
        })
    }

    /// Signals the event, waking all current waiters.
    pub fn signal(&self) {
        let sl = self.sched.lock();
        self.sync.signal(&sl);
    }

    /// Clears the signaled state.
    pub fn clear(&self) {
        let sl = self.sched.lock();
        self.sync.clear(&sl);
    }

    /// Returns the signaled flag.
    pub fn is_signaled(&self) -> bool {
        let sl = self.sched.lock();
        self.sync.is_signaled(&sl)
    }
}

impl KernelObject for Event {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Event"
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

    #[test]
    fn test_signal_clear_cycle() {
        let sched = Arc::new(SchedulerLock::new());
        let event = Event::new(sched, "evt".to_string());

        assert!(!event.is_signaled());
        event.signal();
        assert!(event.is_signaled());
        // Repeated signal is idempotent.
        event.signal();
        assert!(event.is_signaled());
        event.clear();
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_clear_unsignaled_is_noop() {
        let sched = Arc::new(SchedulerLock::new());
        let event = Event::new(sched, "evt".to_string());
        event.clear();
        assert!(!event.is_signaled());
    }
}
