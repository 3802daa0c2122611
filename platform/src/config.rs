//! Platform configuration
//!
//! Boot-time knobs for the timer and the scheduler core. Values come from
//! `PlatformConfig::default()` and may be overridden from the boot command
//! line (`sched.quantum=20 timer.hz=1000 log=debug`).

use core::fmt;
use log::LevelFilter;

/// i8254 input clock as wired on the PC board (Hz)
pub const DEFAULT_PIT_SOURCE_HZ: u32 = 1_193_180;

/// Timer interrupts per second (one tick = 1 ms)
pub const DEFAULT_TICKS_PER_SECOND: u32 = 1_000;

/// Nanoseconds accumulated into the clock overflow on every pulse
pub const DEFAULT_PULSE_REMAINDER_NS: u32 = 193_180;

/// Ticks a thread runs before it is considered for rotation
pub const DEFAULT_QUANTUM: u32 = 10;

/// Thread slots allocated at boot
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Sleep queue entries allocated at boot
pub const DEFAULT_SLEEP_SLOTS: usize = 256;

/// One millisecond in nanoseconds
pub const NANOS_PER_TICK: u32 = 1_000_000;

/// Configuration rejected at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Quantum of zero ticks
    ZeroQuantum,
    /// Per-pulse remainder must stay below one tick
    RemainderOutOfRange { remainder_ns: u32 },
    /// Source / rate does not produce a 16-bit, non-zero divisor
    InvalidDivisor { source_hz: u32, ticks_per_second: u32 },
    /// Thread table must hold at least one slot
    NoThreadSlots,
    /// Sleep queue must hold at least one entry
    NoSleepSlots,
    /// Boot argument could not be parsed
    InvalidValue { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroQuantum => write!(f, "quantum must be at least one tick"),
            Self::RemainderOutOfRange { remainder_ns } => {
                write!(f, "pulse remainder {} ns must be < {}", remainder_ns, NANOS_PER_TICK)
            }
            Self::InvalidDivisor { source_hz, ticks_per_second } => {
                write!(f, "no 16-bit PIT divisor for {} Hz / {} per second", source_hz, ticks_per_second)
            }
            Self::NoThreadSlots => write!(f, "thread table needs at least one slot"),
            Self::NoSleepSlots => write!(f, "sleep queue needs at least one slot"),
            Self::InvalidValue { key } => write!(f, "invalid value for boot argument '{}'", key),
        }
    }
}

/// Platform timer / scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// PIT input frequency (Hz)
    pub pit_source_hz: u32,
    /// Pulses per second requested from the PIT
    pub ticks_per_second: u32,
    /// Fixed remainder added to the overflow accumulator per pulse (ns)
    pub pulse_remainder_ns: u32,
    /// Rotation period in ticks
    pub quantum: u32,
    /// Thread table capacity
    pub max_threads: usize,
    /// Sleep queue capacity
    pub sleep_slots: usize,
    /// Maximum log level for the serial logger
    pub log_level: LevelFilter,
}

impl PlatformConfig {
    pub const fn new() -> Self {
        Self {
            pit_source_hz: DEFAULT_PIT_SOURCE_HZ,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            pulse_remainder_ns: DEFAULT_PULSE_REMAINDER_NS,
            quantum: DEFAULT_QUANTUM,
            max_threads: DEFAULT_MAX_THREADS,
            sleep_slots: DEFAULT_SLEEP_SLOTS,
            log_level: LevelFilter::Info,
        }
    }

    pub const fn with_quantum(mut self, quantum: u32) -> Self {
        self.quantum = quantum;
        self
    }

    pub const fn with_pulse_remainder_ns(mut self, remainder_ns: u32) -> Self {
        self.pulse_remainder_ns = remainder_ns;
        self
    }

    pub const fn with_ticks_per_second(mut self, ticks_per_second: u32) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub const fn with_sleep_slots(mut self, sleep_slots: usize) -> Self {
        self.sleep_slots = sleep_slots;
        self
    }

    pub const fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.pulse_remainder_ns >= NANOS_PER_TICK {
            return Err(ConfigError::RemainderOutOfRange {
                remainder_ns: self.pulse_remainder_ns,
            });
        }
        crate::time::PulseRate::new(self.pit_source_hz, self.ticks_per_second)?;
        if self.max_threads == 0 || self.max_threads > u32::MAX as usize {
            return Err(ConfigError::NoThreadSlots);
        }
        if self.sleep_slots == 0 {
            return Err(ConfigError::NoSleepSlots);
        }
        Ok(())
    }

    /// Apply `key=value` boot arguments on top of the defaults.
    ///
    /// Arguments are separated by whitespace; keys this layer does not own
    /// are left to the rest of the runtime and skipped.
    pub fn from_cmdline(cmdline: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for arg in cmdline.split_whitespace() {
            let Some((key, value)) = arg.split_once('=') else {
                continue;
            };
            match key {
                "timer.hz" => config.ticks_per_second = parse_u32("timer.hz", value)?,
                "timer.source_hz" => config.pit_source_hz = parse_u32("timer.source_hz", value)?,
                "timer.remainder_ns" => {
                    config.pulse_remainder_ns = parse_u32("timer.remainder_ns", value)?
                }
                "sched.quantum" => config.quantum = parse_u32("sched.quantum", value)?,
                "sched.max_threads" => {
                    config.max_threads = parse_u32("sched.max_threads", value)? as usize
                }
                "sched.sleep_slots" => {
                    config.sleep_slots = parse_u32("sched.sleep_slots", value)? as usize
                }
                "log" => config.log_level = parse_level(value)?,
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u32(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidValue { key })
}

fn parse_level(value: &str) -> Result<LevelFilter, ConfigError> {
    match value {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        _ => Err(ConfigError::InvalidValue { key: "log" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlatformConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.quantum, 10);
        assert_eq!(config.pulse_remainder_ns, 193_180);
    }

    #[test]
    fn test_rejects_zero_quantum() {
        let config = PlatformConfig::new().with_quantum(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroQuantum));
    }

    #[test]
    fn test_rejects_remainder_of_a_full_tick() {
        let config = PlatformConfig::new().with_pulse_remainder_ns(1_000_000);
        assert_eq!(
            config.validate(),
            Err(ConfigError::RemainderOutOfRange { remainder_ns: 1_000_000 })
        );
    }

    #[test]
    fn test_rejects_rate_without_16bit_divisor() {
        // 1_193_180 / 10 does not fit in the 16-bit counter
        let config = PlatformConfig::new().with_ticks_per_second(10);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDivisor { .. })));
    }

    #[test]
    fn test_cmdline_overrides() {
        let config =
            PlatformConfig::from_cmdline("root=/dev/ram0 sched.quantum=20 log=debug quiet").unwrap();
        assert_eq!(config.quantum, 20);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.ticks_per_second, DEFAULT_TICKS_PER_SECOND);
    }

    #[test]
    fn test_cmdline_bad_number() {
        assert_eq!(
            PlatformConfig::from_cmdline("sched.quantum=ten"),
            Err(ConfigError::InvalidValue { key: "sched.quantum" })
        );
    }

    #[test]
    fn test_cmdline_is_validated() {
        assert_eq!(
            PlatformConfig::from_cmdline("sched.sleep_slots=0"),
            Err(ConfigError::NoSleepSlots)
        );
    }
}
