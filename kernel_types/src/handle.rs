//! Guest-visible handles with generation tagging
//!
//! A handle is an opaque 32-bit value the guest uses to name a kernel
//! object. It encodes a handle-table slot index in the low bits and a
//! generation tag above it. A handle is only accepted while its generation
//! matches the slot's current generation, so a handle that survives its
//! slot being freed and reused is rejected instead of silently aliasing
//! the new occupant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits used for the slot index.
pub const INDEX_BITS: u32 = 15;

/// Number of bits used for the generation tag.
pub const GENERATION_BITS: u32 = 15;

const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Maximum number of addressable handle-table slots.
pub const MAX_SLOTS: usize = 1 << INDEX_BITS;

/// Opaque handle naming a kernel object through a generation-checked
/// table slot.
///
/// The guest never sees object pointers, only handles. The all-zero
/// value is reserved and never issued: generations start at 1, so every
/// issued handle is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The invalid (null) handle.
    pub const INVALID: Handle = Handle(0);

    /// Composes a handle from a slot index and a generation tag.
    pub const fn from_parts(index: u16, generation: u16) -> Self {
        Self(((generation as u32 & GENERATION_MASK) << INDEX_BITS) | (index as u32 & INDEX_MASK))
    }

    /// Reconstructs a handle from its raw guest-visible value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw guest-visible value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Returns the slot index portion.
    pub const fn index(&self) -> u16 {
        (self.0 & INDEX_MASK) as u16
    }

    /// Returns the generation tag portion.
    pub const fn generation(&self) -> u16 {
        ((self.0 >> INDEX_BITS) & GENERATION_MASK) as u16
    }

    /// Returns true if this is not the reserved null handle.
    ///
    /// A nonzero handle may still be stale; only the owning handle table
    /// can decide that.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(0x{:08X})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        let handle = Handle::from_parts(42, 7);
        assert_eq!(handle.index(), 42);
        assert_eq!(handle.generation(), 7);
    }

    #[test]
    fn test_handle_raw_round_trip() {
        let handle = Handle::from_parts(3, 1);
        let reconstructed = Handle::from_raw(handle.raw());
        assert_eq!(handle, reconstructed);
    }

    #[test]
    fn test_invalid_handle_is_zero() {
        assert_eq!(Handle::INVALID.raw(), 0);
        assert!(!Handle::INVALID.is_valid());
    }

    #[test]
    fn test_nonzero_generation_makes_handle_valid() {
        // Index 0 with generation 1 must still be distinguishable from null.
        let handle = Handle::from_parts(0, 1);
        assert!(handle.is_valid());
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.generation(), 1);
    }

    #[test]
    fn test_index_and_generation_do_not_overlap() {
        let handle = Handle::from_parts(u16::MAX, u16::MAX);
        assert_eq!(handle.index() as u32, INDEX_MASK);
        assert_eq!(handle.generation() as u32, GENERATION_MASK);
    }

    #[test]
    fn test_handle_display() {
        let handle = Handle::from_parts(1, 1);
        let display = format!("{}", handle);
        assert!(display.starts_with("Handle(0x"));
    }
}
