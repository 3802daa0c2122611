//! Scheduler core
//!
//! Timer-side half of scheduling: thread slots, the intrusive ready
//! linkage, the sleep queue and the timer interrupt handler. Picking the
//! next thread is delegated to a [`SchedulerPolicy`].

pub mod context;
pub mod error;
pub mod irq;
pub mod policy;
pub mod sleep_queue;
pub mod stats;
pub mod switch;
pub mod thread;
pub mod thread_queue;

// Re-exports
pub use context::{SchedulerContext, SleepTicket};
pub use error::{invariant_violated, SchedulerError, SchedulerResult};
pub use policy::SchedulerPolicy;
pub use sleep_queue::{SleepQueue, TimerEntry};
pub use stats::TimerStats;
pub use switch::{CpuContext, SwitchPlan};
pub use thread::{QueueId, QueueTag, ThreadId, ThreadTable};
pub use thread_queue::ThreadQueue;
