//! Time abstractions
//!
//! Guest timeouts arrive as signed nanosecond counts; a negative value is
//! the distinguished "wait forever" sentinel. `WaitTimeout` captures that
//! tri-state (zero / bounded / infinite) so the wait engine never has to
//! reason about raw sign bits.

use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

/// A point in time
///
/// Opaque nanosecond count since an arbitrary epoch. Host wall-clock time
/// maps onto it at the emulation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instant {
    nanos: u64,
}

impl Instant {
    /// Creates an instant from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Returns nanoseconds since epoch
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration since another instant
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant::from_nanos(self.nanos.saturating_add(duration.as_nanos()))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, duration: Duration) -> Self::Output {
        Instant::from_nanos(self.nanos.saturating_sub(duration.as_nanos()))
    }
}

/// A duration of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    /// Creates a duration from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from microseconds
    pub const fn from_micros(micros: u64) -> Self {
        Self {
            nanos: micros * 1_000,
        }
    }

    /// Creates a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Returns the duration in nanoseconds
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Returns true for the zero duration
    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Self::Output {
        Duration::from_nanos(self.nanos.saturating_add(other.nanos))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, other: Duration) -> Self::Output {
        Duration::from_nanos(self.nanos.saturating_sub(other.nanos))
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        std::time::Duration::from_nanos(duration.as_nanos())
    }
}

/// Timeout for a synchronization wait
///
/// Guest ABI: a negative nanosecond count means "never time out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitTimeout {
    /// Never expires; the wait ends only on a signal or cancellation.
    Infinite,
    /// Expires after the given duration. Zero means "poll": fail with a
    /// timeout immediately unless something is already signaled.
    Bounded(Duration),
}

impl WaitTimeout {
    /// Decodes a guest-supplied signed nanosecond timeout.
    pub fn from_nanos(nanos: i64) -> Self {
        if nanos < 0 {
            WaitTimeout::Infinite
        } else {
            WaitTimeout::Bounded(Duration::from_nanos(nanos as u64))
        }
    }

    /// Returns true for the zero (poll) timeout.
    pub fn is_zero(&self) -> bool {
        matches!(self, WaitTimeout::Bounded(d) if d.is_zero())
    }

    /// Returns the host-clock deadline for this timeout, if any.
    pub fn deadline(&self) -> Option<std::time::Instant> {
        match self {
            WaitTimeout::Infinite => None,
            WaitTimeout::Bounded(d) => Some(std::time::Instant::now() + (*d).into()),
        }
    }
}
