// src/lib.rs
// Couche plate-forme du runtime Java bare-metal : timer, horloge, dormeurs
#![cfg_attr(not(test), no_std)]

//! JaM platform layer
//!
//! Hardware-timer-driven preemption for a bare-metal Java runtime:
//! - `time`: tick/overflow clock and i8254 PIT programming
//! - `scheduler`: thread slot table, intrusive ready linkage, sleep queue,
//!   timer interrupt handler
//! - `system_timer`: the boot-constructed service tying them to the hardware
//!
//! The run-queue policy (which ready thread runs next) is external and
//! plugged in through [`scheduler::SchedulerPolicy`].

extern crate alloc;

pub mod arch;
pub mod config;
pub mod logger;
pub mod scheduler;
pub mod system_timer;
pub mod time;

// Re-exports
pub use arch::{Hal, InterruptGuard};
pub use config::{ConfigError, PlatformConfig};
pub use scheduler::{
    CpuContext, QueueTag, SchedulerContext, SchedulerError, SchedulerPolicy, SchedulerResult,
    SleepQueue, ThreadId, ThreadQueue, ThreadTable, TimerStats,
};
pub use system_timer::SystemTimer;
pub use time::{Clock, NanoClock, PulseRate};
