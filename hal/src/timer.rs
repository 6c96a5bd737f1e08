//! # Timer Device
//!
//! Hardware abstraction for monotonic time measurement.
//!
//! ## Philosophy
//!
//! **Time is a service, not a global variable.**
//!
//! This trait provides a monotonic nanosecond counter. It does NOT:
//! - Provide wall-clock time (no UTC, no timezones)
//! - Block or sleep (polling only)
//! - Wake anybody up (deadline wakeups belong to the scheduler)
//!
//! ## Design Principles
//!
//! 1. **Monotonic**: readings never go backwards
//! 2. **Non-blocking**: always returns immediately
//! 3. **Shared**: read concurrently from every core

/// Hardware timer device trait
///
/// # Examples
///
/// ```
/// use hal::TimerDevice;
///
/// fn elapsed<T: TimerDevice>(timer: &T, since: u64) -> u64 {
///     timer.now_nanos().saturating_sub(since)
/// }
/// ```
pub trait TimerDevice: Send + Sync {
    /// Nanoseconds since boot
    fn now_nanos(&self) -> u64;
}
