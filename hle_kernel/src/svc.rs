//! SVC entry points
//!
//! The guest-facing call surface of the synchronization subsystem. Each
//! entry validates its arguments before touching any state, performs the
//! call, and records the outcome in the kernel's audit log.
//!
//! The 32-bit convention passes the 64-bit timeout as two register
//! halves; apart from that packing, the 32-bit entries forward to their
//! 64-bit counterparts unchanged.

use crate::event::Event;
use crate::process::Process;
use crate::thread::EmuThread;
use crate::wait;
use crate::KernelCore;
use kernel_types::{CoreId, Handle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use svc_api::{combine_timeout, SvcError, SvcResult, WaitTimeout, ARGUMENT_HANDLE_COUNT_MAX};

/// One entry in the SVC audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvcEvent {
    /// A call crossed the SVC boundary.
    Invoked { call: String },
    /// The call returned success.
    Completed { call: String },
    /// The call returned a result code.
    Rejected { call: String, reason: SvcError },
}

/// Append-only record of SVC boundary crossings.
#[derive(Debug, Default)]
pub struct SvcAuditLog {
    events: Vec<SvcEvent>,
}

impl SvcAuditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&mut self, event: SvcEvent) {
        self.events.push(event);
    }

    /// Returns all recorded events in order.
    pub fn events(&self) -> &[SvcEvent] {
        &self.events
    }

    /// Returns true if any event matches the predicate.
    pub fn has_event(&self, predicate: impl Fn(&SvcEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }

    /// Counts the events matching the predicate.
    pub fn count_events(&self, predicate: impl Fn(&SvcEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl KernelCore {
    fn invoke(&self, call: &str) {
        self.audit_log().record(SvcEvent::Invoked {
            call: call.to_string(),
        });
    }

    fn conclude<T>(&self, call: &str, result: SvcResult<T>) -> SvcResult<T> {
        let event = match &result {
            Ok(_) => SvcEvent::Completed {
                call: call.to_string(),
            },
            Err(reason) => SvcEvent::Rejected {
                call: call.to_string(),
                reason: *reason,
            },
        };
        self.audit_log().record(event);
        result
    }

    /// CloseHandle: releases the table's reference to the object.
    pub fn close_handle(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        self.invoke("CloseHandle");
        let result = if process.handle_table().remove(handle) {
            Ok(())
        } else {
            Err(SvcError::InvalidHandle)
        };
        self.conclude("CloseHandle", result)
    }

    /// ResetSignal: clears a readable event or a process's signaled
    /// state, tried in that order.
    pub fn reset_signal(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        self.invoke("ResetSignal");
        let result = self.reset_signal_inner(process, handle);
        self.conclude("ResetSignal", result)
    }

    fn reset_signal_inner(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        let (event, target) = {
            let table = process.handle_table();
            (
                table.get_object::<Event>(handle),
                table.get_object::<Process>(handle),
            )
        };
        if let Some(event) = event {
            event.clear();
            Ok(())
        } else if let Some(target) = target {
            let sl = self.sched().lock();
            target.reset(&sl);
            Ok(())
        } else {
            Err(SvcError::InvalidHandle)
        }
    }

    /// WaitSynchronization: blocks the calling thread until one of the
    /// named objects signals, the wait is cancelled, or the timeout
    /// elapses. Returns the index of the satisfying handle.
    ///
    /// The count bounds are checked before any guest memory is read;
    /// a zero count never touches the handle table.
    pub fn wait_synchronization(
        &self,
        process: &Arc<Process>,
        thread: &Arc<EmuThread>,
        handles_address: u64,
        count: i32,
        timeout_nanos: i64,
    ) -> SvcResult<usize> {
        self.invoke("WaitSynchronization");
        let result =
            self.wait_synchronization_inner(process, thread, handles_address, count, timeout_nanos);
        self.conclude("WaitSynchronization", result)
    }

    fn wait_synchronization_inner(
        &self,
        process: &Arc<Process>,
        thread: &Arc<EmuThread>,
        handles_address: u64,
        count: i32,
        timeout_nanos: i64,
    ) -> SvcResult<usize> {
        if count < 0 || count as usize > ARGUMENT_HANDLE_COUNT_MAX {
            return Err(SvcError::OutOfRange);
        }
        let count = count as usize;

        let objects = if count == 0 {
            Vec::new()
        } else {
            let handles = self
                .memory()
                .read_handles(handles_address, count)
                .ok_or(SvcError::InvalidAddress)?;
            process
                .handle_table()
                .get_waitables(&handles)
                .ok_or(SvcError::InvalidHandle)?
        };

        wait::wait_for_objects(
            self.sched(),
            thread,
            &objects,
            WaitTimeout::from_nanos(timeout_nanos),
        )
    }

    /// CancelSynchronization: wakes the named thread's pending wait with
    /// a cancellation. Succeeds as a no-op when the thread is not
    /// waiting.
    pub fn cancel_synchronization(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        self.invoke("CancelSynchronization");
        let target = process.handle_table().get_object::<EmuThread>(handle);
        let result = match target {
            Some(target) => {
                let sl = self.sched().lock();
                target.cancel_wait(&sl);
                Ok(())
            }
            None => Err(SvcError::InvalidHandle),
        };
        self.conclude("CancelSynchronization", result)
    }

    /// SynchronizePreemptionState: if the thread currently running on
    /// the core is the one pinned there, clears its interrupt flag and
    /// unpins it. Acts at most once per pinning.
    pub fn synchronize_preemption_state(
        &self,
        process: &Arc<Process>,
        core: CoreId,
    ) -> SvcResult<()> {
        self.invoke("SynchronizePreemptionState");
        {
            let sl = self.sched().lock();
            let current = self.current_thread(core, &sl);
            let pinned = process.pinned_thread(core, &sl);
            if let (Some(current), Some(pinned)) = (current, pinned) {
                if Arc::ptr_eq(&current, &pinned) {
                    current.clear_interrupt_flag();
                    process.unpin_thread(core, &sl);
                }
            }
        }
        self.conclude("SynchronizePreemptionState", Ok(()))
    }

    /// 32-bit WaitSynchronization: the timeout arrives as two register
    /// halves.
    pub fn wait_synchronization32(
        &self,
        process: &Arc<Process>,
        thread: &Arc<EmuThread>,
        handles_address: u32,
        count: i32,
        timeout_low: u32,
        timeout_high: u32,
    ) -> SvcResult<usize> {
        self.wait_synchronization(
            process,
            thread,
            handles_address as u64,
            count,
            combine_timeout(timeout_low, timeout_high),
        )
    }

    /// 32-bit CloseHandle: forwards unchanged.
    pub fn close_handle32(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        self.close_handle(process, handle)
    }

    /// 32-bit ResetSignal: forwards unchanged.
    pub fn reset_signal32(&self, process: &Arc<Process>, handle: Handle) -> SvcResult<()> {
        self.reset_signal(process, handle)
    }

    /// 32-bit CancelSynchronization: forwards unchanged.
    pub fn cancel_synchronization32(
        &self,
        process: &Arc<Process>,
        handle: Handle,
    ) -> SvcResult<()> {
        self.cancel_synchronization(process, handle)
    }

    /// 32-bit SynchronizePreemptionState: forwards unchanged.
    pub fn synchronize_preemption_state32(
        &self,
        process: &Arc<Process>,
        core: CoreId,
    ) -> SvcResult<()> {
        self.synchronize_preemption_state(process, core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_records_in_order() {
        let mut log = SvcAuditLog::new();
        assert!(log.is_empty());

        log.record(SvcEvent::Invoked {
            call: "CloseHandle".to_string(),
        });
        log.record(SvcEvent::Rejected {
            call: "CloseHandle".to_string(),
            reason: SvcError::InvalidHandle,
        });

        assert_eq!(log.len(), 2);
        assert!(matches!(log.events()[0], SvcEvent::Invoked { .. }));
        assert!(matches!(log.events()[1], SvcEvent::Rejected { .. }));
    }

    #[test]
    fn test_audit_log_predicates() {
        let mut log = SvcAuditLog::new();
        log.record(SvcEvent::Invoked {
            call: "WaitSynchronization".to_string(),
        });
        log.record(SvcEvent::Completed {
            call: "WaitSynchronization".to_string(),
        });

        assert!(log.has_event(|event| {
            matches!(event, SvcEvent::Completed { call } if call == "WaitSynchronization")
        }));
        assert!(!log.has_event(|event| matches!(event, SvcEvent::Rejected { .. })));
        assert_eq!(
            log.count_events(|event| {
                matches!(
                    event,
                    SvcEvent::Invoked { call } | SvcEvent::Completed { call }
                        if call == "WaitSynchronization"
                )
            }),
            2
        );
    }

    #[test]
    fn test_events_serialize() {
        let event = SvcEvent::Rejected {
            call: "WaitSynchronization".to_string(),
            reason: SvcError::TimedOut,
        };
        let round_trip: SvcEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(round_trip, event);
    }
}
