//! Handle table
//!
//! Per-process mapping from guest-visible [`Handle`] values to kernel
//! objects. Each occupied slot owns one shared reference to its object;
//! closing the handle releases that reference.
//!
//! Handles encode a slot index and a per-slot generation tag. The
//! generation is bumped on every reuse of a slot (never landing on zero),
//! so a stale handle kept across a close/reopen of the same slot fails
//! validation instead of aliasing the new object.
//!
//! The table itself is not synchronized; [`Process`](crate::process::Process)
//! wraps it in a mutex.

use crate::object::{downcast, KernelObject, ObjectRef};
use kernel_types::{Handle, GENERATION_BITS, MAX_SLOTS};
use std::sync::Arc;
use svc_api::{SvcError, SvcResult};

const GENERATION_MASK: u16 = ((1u32 << GENERATION_BITS) - 1) as u16;

#[derive(Default)]
struct Slot {
    object: Option<ObjectRef>,
    generation: u16,
}

/// Fixed-capacity handle-to-object table with generation-tagged slots.
pub struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<u16>,
}

impl HandleTable {
    /// Creates a table with the given slot capacity.
    ///
    /// Capacities above the handle encoding's index range are clamped.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_SLOTS);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        // Low indices are handed out first.
        let free = (0..capacity as u16).rev().collect();
        Self { slots, free }
    }

    /// Inserts an object and returns the new handle.
    ///
    /// Fails with [`SvcError::OutOfRange`] when every slot is occupied.
    pub fn add(&mut self, object: ObjectRef) -> SvcResult<Handle> {
        let index = self.free.pop().ok_or(SvcError::OutOfRange)?;
        let slot = &mut self.slots[index as usize];

        let mut generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
        if generation == 0 {
            generation = 1;
        }
        slot.generation = generation;
        slot.object = Some(object);

        Ok(Handle::from_parts(index, generation))
    }

    /// Closes a handle, releasing the table's reference to the object.
    ///
    /// Returns false for an invalid or stale handle.
    pub fn remove(&mut self, handle: Handle) -> bool {
        let Some(slot) = self.lookup_mut(handle) else {
            return false;
        };
        slot.object = None;
        self.free.push(handle.index());
        true
    }

    /// Resolves a handle to its object, taking a new shared reference.
    pub fn get(&self, handle: Handle) -> Option<ObjectRef> {
        self.lookup(handle).and_then(|slot| slot.object.clone())
    }

    /// Resolves a handle to a concrete object variant.
    pub fn get_object<T: KernelObject + 'static>(&self, handle: Handle) -> Option<Arc<T>> {
        self.get(handle).and_then(|object| downcast::<T>(&object))
    }

    /// Resolves a handle to an object with the synchronization capability.
    pub fn get_waitable(&self, handle: Handle) -> Option<ObjectRef> {
        self.get(handle).filter(|object| object.waitable().is_some())
    }

    /// Resolves a batch of handles all-or-nothing.
    ///
    /// Returns `None` if any handle is invalid, stale, or refers to a
    /// non-waitable object; no partial results escape.
    pub fn get_waitables(&self, handles: &[Handle]) -> Option<Vec<ObjectRef>> {
        let mut objects = Vec::with_capacity(handles.len());
        for &handle in handles {
            objects.push(self.get_waitable(handle)?);
        }
        Some(objects)
    }

    /// Releases every occupied slot (process teardown).
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.take().is_some() {
                self.free.push(index as u16);
            }
        }
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, handle: Handle) -> Option<&Slot> {
        if !handle.is_valid() {
            return None;
        }
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.object.is_some() && slot.generation == handle.generation() {
            Some(slot)
        } else {
            None
        }
    }

    fn lookup_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        if !handle.is_valid() {
            return None;
        }
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.object.is_some() && slot.generation == handle.generation() {
            Some(slot)
        } else {
            None
        }
    }
}
