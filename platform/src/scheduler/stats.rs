//! Timer statistics

use core::fmt;

/// Counters maintained by the timer core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Hardware pulses seen
    pub pulses: u64,
    /// Pulses that arrived before the runtime finished booting
    pub early_pulses: u64,
    /// Sleepers woken by their deadline
    pub expirations: u64,
    /// Sleepers removed by an explicit cancel
    pub cancellations: u64,
    /// Quantum rotations performed
    pub rotations: u64,
    /// Enqueue attempts on a thread that was already queued
    pub redundant_enqueues: u64,
    /// Context switches planned
    pub context_switches: u64,
}

impl fmt::Display for TimerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pulses={} early={} expired={} cancelled={} rotations={} redundant={} switches={}",
            self.pulses,
            self.early_pulses,
            self.expirations,
            self.cancellations,
            self.rotations,
            self.redundant_enqueues,
            self.context_switches
        )
    }
}
