//! # Kernel Core Types
//!
//! Foundational types shared by every layer of the HLE kernel:
//! guest-visible handles, kernel object identifiers, and core identifiers.
//!
//! This crate is a leaf. It carries no kernel behavior, only the value
//! types the other crates agree on.

pub mod handle;
pub mod ids;

pub use handle::{Handle, GENERATION_BITS, INDEX_BITS, MAX_SLOTS};
pub use ids::{CoreId, ObjectId};
