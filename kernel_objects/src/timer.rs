//! # Simulated Clock
//!
//! Deterministic time source for hosted execution.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! Time only moves when a test moves it. Clones share one counter, so the
//! scheduler and the test driving it always agree on "now".

use hal::TimerDevice;
use kernel_api::{Duration, Instant};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, explicitly advanced nanosecond clock
///
/// # Examples
///
/// ```
/// use kernel_objects::timer::SimClock;
/// use kernel_api::Duration;
///
/// let clock = SimClock::new();
/// let view = clock.clone();
/// clock.advance(Duration::from_millis(5));
/// assert_eq!(view.now().as_nanos(), 5_000_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    nanos: Arc<AtomicU64>,
}

impl SimClock {
    /// Creates a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    pub fn now(&self) -> Instant {
        Instant::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    /// Moves time forward, saturating at the far future
    ///
    /// Parked tasks are not woken by this alone; see
    /// [`HostScheduler::advance_time`](crate::scheduler::HostScheduler::advance_time).
    pub fn advance(&self, by: Duration) -> Instant {
        let mut current = self.nanos.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(by.as_nanos());
            match self
                .nanos
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Instant::from_nanos(next),
                Err(seen) => current = seen,
            }
        }
    }
}

impl TimerDevice for SimClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(SimClock::new().now(), Instant::ZERO);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = SimClock::starting_at(Instant::from_nanos(1000));
        let other = clock.clone();
        clock.advance(Duration::from_nanos(500));
        assert_eq!(other.now_nanos(), 1500);
    }

    #[test]
    fn test_advance_saturates() {
        let clock = SimClock::starting_at(Instant::from_nanos(u64::MAX - 10));
        let now = clock.advance(Duration::from_secs(1));
        assert_eq!(now, Instant::FOREVER);
    }
}
