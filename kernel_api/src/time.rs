//! Time abstractions
//!
//! Deadlines are absolute instants on the kernel clock. The clock is owned by
//! the scheduler; on the host it only moves when told to.

use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

/// A point in time on the kernel clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant {
    /// Nanoseconds since boot
    nanos: u64,
}

impl Instant {
    /// Boot time
    pub const ZERO: Instant = Instant { nanos: 0 };

    /// A deadline that never elapses
    pub const FOREVER: Instant = Instant { nanos: u64::MAX };

    /// Creates an instant from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Returns nanoseconds since boot
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    pub const fn is_forever(&self) -> bool {
        self.nanos == u64::MAX
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
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration {
    /// Nanoseconds
    nanos: u64,
}

impl Duration {
    pub const ZERO: Duration = Duration { nanos: 0 };

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_creation() {
        assert_eq!(Duration::from_secs(1), Duration::from_millis(1000));
        assert_eq!(Duration::from_millis(1), Duration::from_micros(1000));
        assert_eq!(Duration::from_millis(3).as_millis(), 3);
    }

    #[test]
    fn test_instant_arithmetic() {
        let i = Instant::from_nanos(1000);
        let d = Duration::from_nanos(500);

        assert_eq!(i + d, Instant::from_nanos(1500));
        assert_eq!(i - d, Instant::from_nanos(500));
        assert_eq!((i + d).duration_since(i), d);
    }

    #[test]
    fn test_forever_saturates() {
        assert!(Instant::FOREVER.is_forever());
        assert_eq!(Instant::FOREVER + Duration::from_secs(1), Instant::FOREVER);
        assert!(Instant::ZERO < Instant::FOREVER);
    }
}
