//! Port / session rendezvous
//!
//! A [`Port`] is a named rendezvous point: a client endpoint that enqueues
//! connection sessions and a server endpoint that accepts them. Both
//! endpoints share one lifecycle core holding the port state machine:
//!
//! ```text
//! Invalid --initialize--> Normal --on_client_closed--> ClientClosed
//!                                \--on_server_closed--> ServerClosed
//! ```
//!
//! Closure transitions are terminal and idempotent-safe. Closing either
//! side abandons pending sessions and signals the paired endpoint, so a
//! thread blocked on the other end observes the closure as a wake.
//!
//! Session bodies (IPC requests) are out of scope here; a
//! [`ServerSession`] is the ownable, waitable connection object handed
//! from the enqueue side to the accept side.

use crate::object::KernelObject;
use crate::sched_lock::SchedulerLock;
use crate::sync::SyncState;
use kernel_types::ObjectId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use svc_api::{SvcError, SvcResult};

/// Lifecycle state shared by both endpoints of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    /// Created but not yet initialized.
    Invalid,
    /// Open for connections.
    Normal,
    /// The client endpoint closed; terminal.
    ClientClosed,
    /// The server endpoint closed; terminal.
    ServerClosed,
}

#[derive(Debug)]
struct PortInner {
    state: PortState,
    max_sessions: usize,
    is_light: bool,
    name: String,
}

/// Lifecycle core shared by the two endpoints.
///
/// The endpoint sync states live here rather than in the endpoints so a
/// closure on one side can signal the other without a reference cycle.
pub struct PortCore {
    sched: Arc<SchedulerLock>,
    inner: Mutex<PortInner>,
    sessions: Mutex<VecDeque<Arc<ServerSession>>>,
    server_sync: SyncState,
    client_sync: SyncState,
}

impl PortCore {
    fn new(sched: Arc<SchedulerLock>) -> Arc<Self> {
        Arc::new(Self {
            sched,
            inner: Mutex::new(PortInner {
                state: PortState::Invalid,
                max_sessions: 0,
                is_light: false,
                name: String::new(),
            }),
            sessions: Mutex::new(VecDeque::new()),
            server_sync: SyncState::new(),
            client_sync: SyncState::new(),
        })
    }

    fn state(&self) -> PortState {
        self.inner.lock().expect("port state poisoned").state
    }

    /// Moves `Invalid` to `Normal`. Returns false on any other state.
    fn initialize(&self, max_sessions: usize, is_light: bool, name: &str) -> bool {
        let mut inner = self.inner.lock().expect("port state poisoned");
        if inner.state != PortState::Invalid {
            return false;
        }
        inner.state = PortState::Normal;
        inner.max_sessions = max_sessions;
        inner.is_light = is_light;
        inner.name = name.to_string();
        true
    }

    fn enqueue_session(&self, session: Arc<ServerSession>) -> SvcResult<()> {
        let sl = self.sched.lock();
        if self.state() != PortState::Normal {
            return Err(SvcError::PortClosed);
        }
        self.sessions
            .lock()
            .expect("session queue poisoned")
            .push_back(session);
        self.server_sync.signal(&sl);
        Ok(())
    }

    fn accept_session(&self) -> Option<Arc<ServerSession>> {
        let sl = self.sched.lock();
        let mut sessions = self.sessions.lock().expect("session queue poisoned");
        let session = sessions.pop_front();
        if sessions.is_empty() && self.state() == PortState::Normal {
            self.server_sync.clear(&sl);
        }
        drop(sessions);
        drop(sl);
        session
    }

    /// Terminal transition out of `Normal`; no-op from any other state.
    fn close(&self, closed_state: PortState, notify: &SyncState) {
        let sl = self.sched.lock();
        {
            let mut inner = self.inner.lock().expect("port state poisoned");
            if inner.state != PortState::Normal {
                return;
            }
            inner.state = closed_state;
        }
        // Pending sessions are abandoned, never delivered.
        self.sessions
            .lock()
            .expect("session queue poisoned")
            .clear();
        notify.signal(&sl);
    }

    fn pending_sessions(&self) -> usize {
        self.sessions.lock().expect("session queue poisoned").len()
    }
}

/// Accepting endpoint of a port.
pub struct ServerPort {
    id: ObjectId,
    core: Arc<PortCore>,
}

impl ServerPort {
    /// Dequeues the oldest pending session, transferring ownership to the
    /// caller. `None` when no session is pending.
    pub fn accept_session(&self) -> Option<Arc<ServerSession>> {
        self.core.accept_session()
    }

    /// Closes the server side; pending sessions are abandoned and the
    /// client endpoint is signaled.
    pub fn close(&self) {
        self.core
            .close(PortState::ServerClosed, &self.core.client_sync);
    }
}

impl KernelObject for ServerPort {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "ServerPort"
    }

    fn object_name(&self) -> String {
        // Name lives on the shared core; endpoints report the port name.
        self.core.inner.lock().expect("port state poisoned").name.clone()
    }

    fn waitable(&self) -> Option<&SyncState> {
        Some(&self.core.server_sync)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Connecting endpoint of a port.
pub struct ClientPort {
    id: ObjectId,
    core: Arc<PortCore>,
}

impl ClientPort {
    /// Enqueues a connection session for the server side to accept.
    ///
    /// Fails with [`SvcError::PortClosed`] unless the port is `Normal`.
    pub fn enqueue_session(&self, session: Arc<ServerSession>) -> SvcResult<()> {
        self.core.enqueue_session(session)
    }

    /// Closes the client side; pending sessions are abandoned and the
    /// server endpoint is signaled.
    pub fn close(&self) {
        self.core
            .close(PortState::ClientClosed, &self.core.server_sync);
    }

    /// Connectivity probe: true once the server side has closed.
    pub fn is_server_closed(&self) -> bool {
        self.core.state() == PortState::ServerClosed
    }
}

impl KernelObject for ClientPort {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "ClientPort"
    }

    fn object_name(&self) -> String {
        self.core.inner.lock().expect("port state poisoned").name.clone()
    }

    fn waitable(&self) -> Option<&SyncState> {
        Some(&self.core.client_sync)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The endpoint pair plus the shared lifecycle core.
pub struct Port {
    core: Arc<PortCore>,
    server: Arc<ServerPort>,
    client: Arc<ClientPort>,
}

impl Port {
    /// Creates an uninitialized port pair.
    pub fn new(sched: Arc<SchedulerLock>) -> Self {
        let core = PortCore::new(sched);
        let server = Arc::new(ServerPort {
            id: ObjectId::new(),
            core: Arc::clone(&core),
        });
        let client = Arc::new(ClientPort {
            id: ObjectId::new(),
            core: Arc::clone(&core),
        });
        Self {
            core,
            server,
            client,
        }
    }

    /// Opens the port for connections. Must be called exactly once;
    /// repeat calls return false and change nothing.
    pub fn initialize(&self, max_sessions: usize, is_light: bool, name: &str) -> bool {
        self.core.initialize(max_sessions, is_light, name)
    }

    /// Returns the accepting endpoint.
    pub fn server(&self) -> Arc<ServerPort> {
        Arc::clone(&self.server)
    }

    /// Returns the connecting endpoint.
    pub fn client(&self) -> Arc<ClientPort> {
        Arc::clone(&self.client)
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> PortState {
        self.core.state()
    }

    /// Returns the advertised session capacity. Informational; capacity
    /// enforcement is left to callers.
    pub fn max_sessions(&self) -> usize {
        self.core.inner.lock().expect("port state poisoned").max_sessions
    }

    /// Returns true for a light (reduced-feature) port.
    pub fn is_light(&self) -> bool {
        self.core.inner.lock().expect("port state poisoned").is_light
    }

    /// Returns true once the server side has closed.
    pub fn is_server_closed(&self) -> bool {
        self.state() == PortState::ServerClosed
    }

    /// Returns true once the client side has closed.
    pub fn is_client_closed(&self) -> bool {
        self.state() == PortState::ClientClosed
    }

    /// Returns the number of sessions awaiting acceptance.
    pub fn pending_sessions(&self) -> usize {
        self.core.pending_sessions()
    }
}

/// Server half of one accepted (or pending) connection.
///
/// Waitable; signaled when the connection is closed by its peer.
pub struct ServerSession {
    id: ObjectId,
    name: String,
    sched: Arc<SchedulerLock>,
    sync: SyncState,
}

impl ServerSession {
    /// Creates an open session.
    pub fn new(sched: Arc<SchedulerLock>, name: String) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::new(),
            name,
            sched,
            sync: SyncState::new(),
        })
    }

    /// Marks the session closed, waking anyone waiting on it.
    pub fn close(&self) {
        let sl = self.sched.lock();
        self.sync.signal(&sl);
    }
}

impl KernelObject for ServerSession {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "ServerSession"
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
