//! Scheduler Error Handling
//!
//! Two classes of failure exist in the timer core:
//! - rejected requests (`SchedulerError`), returned before any state changes
//! - invariant violations, which abort through [`invariant_violated`] after
//!   dumping the offending structure; there is nothing safe to unwind to
//!   from interrupt context.

use super::thread::ThreadId;
use core::fmt;

/// Scheduler error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// Thread table is full
    ThreadLimitReached { max: usize },

    /// Sleep queue has no free entry
    SleepQueueFull { capacity: usize },

    /// Thread is already a member of some queue
    AlreadyQueued { thread_id: ThreadId },

    /// Thread cannot be released while it is queued
    ThreadStillQueued { thread_id: ThreadId },

    /// Slot index is out of range or not registered
    InvalidThread { thread_id: ThreadId },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadLimitReached { max } => write!(f, "Thread limit reached: {}", max),
            Self::SleepQueueFull { capacity } => {
                write!(f, "Sleep queue full: {} entries", capacity)
            }
            Self::AlreadyQueued { thread_id } => write!(f, "Thread {} already queued", thread_id),
            Self::ThreadStillQueued { thread_id } => {
                write!(f, "Thread {} still queued, cannot release", thread_id)
            }
            Self::InvalidThread { thread_id } => write!(f, "Thread {} not registered", thread_id),
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ThreadLimitReached { .. } => "Release finished threads or raise sched.max_threads",
            Self::SleepQueueFull { .. } => "Raise sched.sleep_slots",
            Self::AlreadyQueued { .. } => "Only the running, unqueued thread may sleep",
            Self::ThreadStillQueued { .. } => "Cancel the sleep before releasing the thread",
            Self::InvalidThread { .. } => "Thread may have already been released",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidThread { .. })
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::InvalidThread { .. } => 2,
            Self::ThreadLimitReached { .. } | Self::SleepQueueFull { .. } => 1,
            Self::AlreadyQueued { .. } | Self::ThreadStillQueued { .. } => 1,
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Abort on a corrupted scheduler structure.
///
/// Logs the reason and the structure dump at error level, then panics.
#[cold]
#[inline(never)]
#[track_caller]
pub fn invariant_violated(structure: &'static str, reason: &'static str, dump: &dyn fmt::Display) -> ! {
    log::error!("[SCHED] {} corrupted: {}", structure, reason);
    log::error!("[SCHED] {}", dump);
    panic!(
        "[SCHED CRITICAL] Invariant violated in {}: {}\n{}",
        structure, reason, dump
    );
}

/// Macro for critical scheduler assertions
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $structure:expr, $reason:expr, $dump:expr) => {
        if !$cond {
            $crate::scheduler::error::invariant_violated($structure, $reason, &$dump);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SchedulerError::SleepQueueFull { capacity: 4 };
        assert_eq!(alloc::format!("{}", err), "Sleep queue full: 4 entries");
    }

    #[test]
    fn test_classification() {
        assert!(SchedulerError::SleepQueueFull { capacity: 1 }.is_recoverable());
        assert!(!SchedulerError::InvalidThread { thread_id: ThreadId(3) }.is_recoverable());
        assert_eq!(SchedulerError::InvalidThread { thread_id: ThreadId(3) }.severity(), 2);
    }

    #[test]
    #[should_panic(expected = "Invariant violated in sleep queue: lost entry")]
    fn test_invariant_violation_panics() {
        invariant_violated("sleep queue", "lost entry", &"[]");
    }
}
