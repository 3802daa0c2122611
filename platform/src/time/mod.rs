//! Time management subsystem
//!
//! Tick clock driven by the PIT pulse, plus the nanosecond source used for
//! sleep deadlines.

pub mod clock;
pub mod pit;

// Re-exports
pub use clock::Clock;
pub use pit::{PitCommand, PulseRate};

use core::time::Duration;

/// Monotonic nanosecond time source supplied by the platform.
///
/// Independent of the tick counter; sleep deadlines are compared against it.
pub trait NanoClock {
    fn now_nanos(&self) -> u64;
}

impl<F: Fn() -> u64> NanoClock for F {
    fn now_nanos(&self) -> u64 {
        self()
    }
}

/// Absolute deadline `delay` after `now`, saturating at `u64::MAX`
pub fn deadline_after(now_nanos: u64, delay: Duration) -> u64 {
    let delay_ns = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    now_nanos.saturating_add(delay_ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_after() {
        assert_eq!(deadline_after(1_000, Duration::from_micros(2)), 3_000);
        assert_eq!(deadline_after(u64::MAX - 1, Duration::from_secs(1)), u64::MAX);
    }

    #[test]
    fn test_closure_is_a_clock() {
        let clock = || 42u64;
        assert_eq!(clock.now_nanos(), 42);
    }
}
