//! PIT (Programmable Interval Timer) 8253/8254
//!
//! Génère les impulsions périodiques qui pilotent l'horloge et la préemption.

use crate::arch::Hal;
use crate::config::ConfigError;
use bitflags::bitflags;

/// Port du canal 0 du PIT
pub const PIT_CHANNEL0: u16 = 0x40;
/// Port de commande du PIT
pub const PIT_COMMAND: u16 = 0x43;

bitflags! {
    /// Mode/Command register (port 0x43)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PitCommand: u8 {
        /// BCD counting instead of binary
        const BCD            = 0b0000_0001;
        /// Mode 2: rate generator
        const MODE_RATE      = 0b0000_0100;
        /// Mode 3: square wave generator
        const MODE_SQUARE    = 0b0000_0110;
        /// Access mode: low byte only
        const ACCESS_LO      = 0b0001_0000;
        /// Access mode: high byte only
        const ACCESS_HI      = 0b0010_0000;
        /// Access mode: low byte then high byte
        const ACCESS_LOHI    = 0b0011_0000;
        /// Select channel 1
        const CHANNEL1       = 0b0100_0000;
        /// Select channel 2
        const CHANNEL2       = 0b1000_0000;
    }
}

impl PitCommand {
    /// Canal 0, lobyte/hibyte, mode 2, binaire
    pub const fn channel0_rate_generator() -> Self {
        Self::ACCESS_LOHI.union(Self::MODE_RATE)
    }
}

/// Pulse frequency derived from the PIT input clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRate {
    source_hz: u32,
    divisor: u16,
}

impl PulseRate {
    /// Compute the 16-bit reload value for `ticks_per_second` pulses.
    pub fn new(source_hz: u32, ticks_per_second: u32) -> Result<Self, ConfigError> {
        let invalid = ConfigError::InvalidDivisor { source_hz, ticks_per_second };
        if ticks_per_second == 0 {
            return Err(invalid);
        }
        let divisor = source_hz / ticks_per_second;
        if divisor == 0 || divisor > u16::MAX as u32 {
            return Err(invalid);
        }
        Ok(Self {
            source_hz,
            divisor: divisor as u16,
        })
    }

    pub const fn divisor(&self) -> u16 {
        self.divisor
    }

    pub const fn source_hz(&self) -> u32 {
        self.source_hz
    }

    /// Exact pulse period in nanoseconds (rounded down)
    pub fn period_ns(&self) -> u64 {
        self.divisor as u64 * 1_000_000_000 / self.source_hz as u64
    }

    /// Signed difference between the pulse period and one millisecond
    pub fn drift_per_pulse_ns(&self) -> i64 {
        self.period_ns() as i64 - 1_000_000
    }

    /// Does adding `remainder_ns` per pulse keep the tick clock on this
    /// rate's real period?
    pub fn tracks_remainder(&self, remainder_ns: u32) -> bool {
        i64::from(remainder_ns) == self.drift_per_pulse_ns()
    }

    /// Program channel 0 to fire at this rate
    pub fn program<H: Hal + ?Sized>(&self, hal: &H) {
        hal.port_write(PIT_COMMAND, PitCommand::channel0_rate_generator().bits());
        // Envoyer le diviseur (low byte puis high byte)
        hal.port_write(PIT_CHANNEL0, (self.divisor & 0xFF) as u8);
        hal.port_write(PIT_CHANNEL0, (self.divisor >> 8) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_byte() {
        assert_eq!(PitCommand::channel0_rate_generator().bits(), 0x34);
        assert_eq!((PitCommand::ACCESS_LOHI | PitCommand::MODE_SQUARE).bits(), 0x36);
    }

    #[test]
    fn test_millisecond_rate() {
        let rate = PulseRate::new(1_193_180, 1_000).unwrap();
        assert_eq!(rate.divisor(), 1_193);
        assert_eq!(rate.period_ns(), 999_849);
        assert_eq!(rate.drift_per_pulse_ns(), -151);
    }

    #[test]
    fn test_remainder_tracking() {
        let millisecond = PulseRate::new(1_193_180, 1_000).unwrap();
        assert!(!millisecond.tracks_remainder(193_180));
        assert!(!millisecond.tracks_remainder(0));

        // divisor 1194: 1_000_687 ns per pulse
        let slow = PulseRate::new(1_193_180, 999).unwrap();
        assert_eq!(slow.drift_per_pulse_ns(), 687);
        assert!(slow.tracks_remainder(687));
        assert!(!slow.tracks_remainder(193_180));
    }

    #[test]
    fn test_divisor_bounds() {
        assert!(PulseRate::new(1_193_180, 0).is_err());
        assert!(PulseRate::new(1_193_180, 18).is_err());
        assert!(PulseRate::new(1_193_180, 19).is_ok());
        assert!(PulseRate::new(1_000, 2_000).is_err());
    }
}
