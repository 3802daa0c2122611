//! Tick clock
//!
//! Turns PIT pulses into a millisecond tick count. The programmed period is
//! not an exact millisecond, so each pulse also adds a fixed remainder (ns)
//! to an overflow accumulator; whenever a full millisecond has built up the
//! tick count gets one extra increment. Integer only, no division: safe to
//! run inside the timer interrupt.

use crate::config::NANOS_PER_TICK;
use core::time::Duration;

/// Millisecond tick counter with sub-tick error accumulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    /// Milliseconds elapsed since boot
    tick: u64,
    /// Pending nanoseconds, always < NANOS_PER_TICK after `advance`
    overflow: u32,
    /// Added to `overflow` on every pulse
    remainder_ns: u32,
}

impl Clock {
    /// Create a stopped clock.
    ///
    /// `remainder_ns` must be below one tick; `PlatformConfig::validate`
    /// rejects anything else before boot gets here.
    pub const fn new(remainder_ns: u32) -> Self {
        Self {
            tick: 0,
            overflow: 0,
            remainder_ns,
        }
    }

    /// Account for one hardware pulse
    #[inline]
    pub fn advance(&mut self) {
        self.tick += 1;
        self.overflow += self.remainder_ns;
        if self.overflow >= NANOS_PER_TICK {
            self.tick += 1;
            self.overflow -= NANOS_PER_TICK;
        }
    }

    /// Milliseconds since boot
    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Sub-tick nanoseconds not yet folded into `ticks`
    #[inline]
    pub const fn overflow_ns(&self) -> u32 {
        self.overflow
    }

    pub const fn remainder_ns(&self) -> u32 {
        self.remainder_ns
    }

    /// Uptime as measured by the tick counter
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(self.tick) + Duration::from_nanos(self.overflow as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_without_remainder() {
        let mut clock = Clock::new(0);
        for _ in 0..25 {
            clock.advance();
        }
        assert_eq!(clock.ticks(), 25);
        assert_eq!(clock.overflow_ns(), 0);
    }

    #[test]
    fn test_default_remainder_carries() {
        let mut clock = Clock::new(193_180);
        // 5 pulses: 965_900 ns pending, no carry yet
        for _ in 0..5 {
            clock.advance();
        }
        assert_eq!(clock.ticks(), 5);
        assert_eq!(clock.overflow_ns(), 965_900);

        // 6th pulse crosses the millisecond
        clock.advance();
        assert_eq!(clock.ticks(), 7);
        assert_eq!(clock.overflow_ns(), 159_080);
    }

    #[test]
    fn test_uptime_includes_overflow() {
        let mut clock = Clock::new(250_000);
        clock.advance();
        clock.advance();
        assert_eq!(clock.uptime(), Duration::from_micros(2_500));
    }

    proptest! {
        #[test]
        fn prop_drift_is_bounded(pulses in 0u64..20_000, remainder in 1u32..1_000_000) {
            let mut clock = Clock::new(remainder);
            for _ in 0..pulses {
                clock.advance();
                prop_assert!(clock.overflow_ns() < NANOS_PER_TICK);
            }
            let carried = pulses * remainder as u64 / NANOS_PER_TICK as u64;
            prop_assert_eq!(clock.ticks(), pulses + carried);
            prop_assert_eq!(
                clock.overflow_ns() as u64,
                pulses * remainder as u64 % NANOS_PER_TICK as u64
            );
        }
    }
}
