//! Kernel objects
//!
//! Every waitable or ownable kernel entity implements [`KernelObject`].
//! Ownership is shared: an object lives inside an `Arc`, and the atomic
//! strong count is its reference count. Handle-table slots, waiter
//! registries, and wait-engine pins each own one increment; the object is
//! destroyed when the count decays to zero, with `Drop` serving as the
//! post-destroy hook.
//!
//! Capabilities are a small closed set dispatched through queries rather
//! than an inheritance chain: `waitable()` exposes the synchronization
//! capability, and `as_any_arc` enables downcasting to the concrete
//! variant for capability checks like "is this handle a thread".

use crate::sync::SyncState;
use kernel_types::ObjectId;
use std::any::Any;
use std::sync::Arc;

/// Base identity shared by every kernel object variant.
pub trait KernelObject: Send + Sync {
    /// Returns the object's diagnostic identifier.
    fn id(&self) -> ObjectId;

    /// Returns the object's variant name for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Returns the object's human-readable name.
    fn object_name(&self) -> String;

    /// Synchronization capability query.
    ///
    /// Objects that can be waited on return their [`SyncState`].
    fn waitable(&self) -> Option<&SyncState> {
        None
    }

    /// Upcast hook enabling dynamic downcasts to the concrete variant.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared owning reference to a kernel object.
pub type ObjectRef = Arc<dyn KernelObject>;

/// Downcasts a shared object reference to its concrete variant.
///
/// Returns `None` when the object is a different variant; the caller's
/// reference is unaffected either way.
pub fn downcast<T: KernelObject + 'static>(object: &ObjectRef) -> Option<Arc<T>> {
    Arc::clone(object).as_any_arc().downcast::<T>().ok()
}
