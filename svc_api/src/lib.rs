//! # SVC API
//!
//! The guest-facing kernel-call contract: result codes, time types, and
//! the ABI constants shared by the 64-bit and 32-bit calling conventions.
//!
//! This crate defines WHAT the call surface promises; `hle_kernel`
//! implements it.

pub mod abi;
pub mod error;
pub mod time;

pub use abi::{combine_timeout, split_timeout, ARGUMENT_HANDLE_COUNT_MAX};
pub use error::{SvcError, SvcResult};
pub use time::{Duration, Instant, WaitTimeout};
