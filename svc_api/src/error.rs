//! Kernel-call result codes
//!
//! Every condition here is recoverable and reported synchronously to the
//! guest through the normal kernel-call return-value ABI. Nothing in this
//! subsystem is fatal to the host.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result codes for guest-facing kernel calls
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvcError {
    /// Handle absent, wrong generation, or wrong object capability
    #[error("Invalid handle")]
    InvalidHandle,

    /// Count argument outside the permitted bounds
    #[error("Argument out of range")]
    OutOfRange,

    /// Wait expired before any object signaled
    #[error("Operation timed out")]
    TimedOut,

    /// Wait explicitly canceled by CancelSynchronization
    #[error("Operation cancelled")]
    Cancelled,

    /// Session enqueue attempted on a port past closure
    #[error("Port is closed")]
    PortClosed,

    /// Guest address not backed by readable memory
    #[error("Invalid guest address")]
    InvalidAddress,
}

/// Result type for guest-facing kernel calls
pub type SvcResult<T> = Result<T, SvcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", SvcError::InvalidHandle), "Invalid handle");
        assert_eq!(format!("{}", SvcError::TimedOut), "Operation timed out");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(SvcError::Cancelled, SvcError::Cancelled);
        assert_ne!(SvcError::Cancelled, SvcError::TimedOut);
    }
}
