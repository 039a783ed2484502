//! # HLE Kernel
//!
//! High-level emulation of a console kernel's synchronization and
//! IPC-handshake core: reference-counted kernel objects behind
//! generation-tagged handle tables, waitable synchronization objects
//! with ordered waiter registries, a reentrant scheduler lock, port
//! rendezvous for session hand-off, and the WaitSynchronization family
//! of guest calls.
//!
//! ## Design
//!
//! Guest behavior is reproduced at the semantic level, not the
//! structural one: object lifetimes ride on `Arc` strong counts instead
//! of hand-rolled reference counting, suspension parks the host thread
//! driving the emulated core instead of switching register contexts, and
//! scheduling-visible mutations are serialized by one reentrant lock
//! whose guard doubles as a compile-time capability token.
//!
//! [`KernelCore`] is the assembly point: it owns the scheduler lock,
//! guest memory, the per-core current-thread bookkeeping, and the SVC
//! audit log, and hands out the object factories.

pub mod event;
pub mod guest_memory;
pub mod handle_table;
pub mod object;
pub mod port;
pub mod process;
pub mod sched_lock;
pub mod svc;
pub mod sync;
pub mod thread;
mod wait;

pub use event::Event;
pub use guest_memory::GuestMemory;
pub use handle_table::HandleTable;
pub use object::{downcast, KernelObject, ObjectRef};
pub use port::{ClientPort, Port, PortState, ServerPort, ServerSession};
pub use process::Process;
pub use sched_lock::{SchedulerLock, SchedulerLockGuard};
pub use svc::{SvcAuditLog, SvcEvent};
pub use sync::SyncState;
pub use thread::{EmuThread, ThreadState};

use kernel_types::CoreId;
use std::sync::{Arc, Mutex, MutexGuard};

/// Emulation parameters.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Number of emulated CPU cores.
    pub core_count: usize,
    /// Size of the simulated guest memory region in bytes.
    pub guest_memory_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            core_count: 4,
            guest_memory_size: 64 * 1024,
        }
    }
}

/// The assembled synchronization subsystem.
pub struct KernelCore {
    config: KernelConfig,
    sched: Arc<SchedulerLock>,
    memory: GuestMemory,
    /// Which emulated thread each core is currently running.
    current: Vec<Mutex<Option<Arc<EmuThread>>>>,
    audit: Mutex<SvcAuditLog>,
}

impl KernelCore {
    /// Creates a kernel with the default configuration.
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a kernel with an explicit configuration.
    pub fn with_config(config: KernelConfig) -> Self {
        let mut current = Vec::with_capacity(config.core_count);
        current.resize_with(config.core_count, || Mutex::new(None));
        Self {
            memory: GuestMemory::new(config.guest_memory_size),
            sched: Arc::new(SchedulerLock::new()),
            current,
            audit: Mutex::new(SvcAuditLog::new()),
            config,
        }
    }

    /// Returns the emulation parameters.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the scheduler lock.
    pub fn sched(&self) -> &Arc<SchedulerLock> {
        &self.sched
    }

    /// Returns the simulated guest memory.
    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    /// Locks and returns the SVC audit log.
    pub fn audit_log(&self) -> MutexGuard<'_, SvcAuditLog> {
        self.audit.lock().expect("audit log poisoned")
    }

    /// Creates an event.
    pub fn create_event(&self, name: &str) -> Arc<Event> {
        Event::new(Arc::clone(&self.sched), name.to_string())
    }

    /// Creates a runnable thread.
    pub fn create_thread(&self, name: &str) -> Arc<EmuThread> {
        EmuThread::new(Arc::clone(&self.sched), name.to_string())
    }

    /// Creates a process with an empty handle table.
    pub fn create_process(&self, name: &str) -> Arc<Process> {
        Process::new(
            Arc::clone(&self.sched),
            name.to_string(),
            self.config.core_count,
        )
    }

    /// Creates an uninitialized port pair.
    pub fn create_port(&self) -> Port {
        Port::new(Arc::clone(&self.sched))
    }

    /// Creates an open server session.
    pub fn create_session(&self, name: &str) -> Arc<ServerSession> {
        ServerSession::new(Arc::clone(&self.sched), name.to_string())
    }

    /// Records which thread a core is running.
    pub fn set_current_thread(
        &self,
        core: CoreId,
        thread: Option<Arc<EmuThread>>,
        _sl: &SchedulerLockGuard,
    ) {
        *self.current[core.0]
            .lock()
            .expect("current thread poisoned") = thread;
    }

    /// Returns the thread a core is currently running.
    pub fn current_thread(
        &self,
        core: CoreId,
        _sl: &SchedulerLockGuard,
    ) -> Option<Arc<EmuThread>> {
        self.current[core.0]
            .lock()
            .expect("current thread poisoned")
            .clone()
    }
}

impl Default for KernelCore {
    fn default() -> Self {
        Self::new()
    }
}
