//! ABI constants and 32-bit compatibility helpers
//!
//! The 32-bit calling convention passes the 64-bit nanosecond timeout as
//! two register-sized halves. The count limit is enforced before any guest
//! memory is touched.

/// Maximum number of handles a single wait may name.
pub const ARGUMENT_HANDLE_COUNT_MAX: usize = 0x40;

/// Combines the 32-bit timeout halves into the signed nanosecond count.
pub const fn combine_timeout(timeout_low: u32, timeout_high: u32) -> i64 {
    ((timeout_high as i64) << 32) | (timeout_low as i64)
}

/// Splits a signed nanosecond count into its 32-bit halves.
pub const fn split_timeout(nanos: i64) -> (u32, u32) {
    (nanos as u32, (nanos >> 32) as u32)
}
