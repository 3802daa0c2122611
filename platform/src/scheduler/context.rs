//! Scheduler context
//!
//! All process-lifetime state of the timer core in one value: the tick
//! clock, the sleep queue, the hand-off linkage, the thread slot table and
//! the external policy. Built once at boot and handed by reference to the
//! interrupt entry point and to thread management; there are no hidden
//! globals behind it.
//!
//! Methods here assume the caller has already excluded the timer interrupt
//! (they run either inside it or under an `InterruptGuard`).

use super::error::{invariant_violated, SchedulerResult};
use super::policy::SchedulerPolicy;
use super::sleep_queue::SleepQueue;
use super::stats::TimerStats;
use super::switch::{CpuContext, SwitchPlan};
use super::thread::{QueueTag, ThreadId, ThreadTable};
use super::thread_queue::ThreadQueue;
use crate::config::PlatformConfig;
use crate::time::Clock;

/// Result of putting the running thread to sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepTicket {
    /// The thread now sleeping
    pub thread: ThreadId,
    /// Switch to perform, `None` when the policy handed the processor back
    /// to the sleeper itself (nothing else to run)
    pub switch: Option<SwitchPlan>,
}

/// Timer core state
pub struct SchedulerContext<P> {
    pub(crate) clock: Clock,
    pub(crate) sleepers: SleepQueue,
    pub(crate) handoff: ThreadQueue,
    pub(crate) threads: ThreadTable,
    pub(crate) policy: P,
    pub(crate) quantum: u32,
    pub(crate) stats: TimerStats,
}

impl<P: SchedulerPolicy> SchedulerContext<P> {
    /// Empty clock, sleep queue and hand-off queue; `config` must already be
    /// validated.
    pub fn new(config: &PlatformConfig, policy: P) -> Self {
        Self {
            clock: Clock::new(config.pulse_remainder_ns),
            sleepers: SleepQueue::with_capacity(config.sleep_slots),
            handoff: ThreadQueue::new(),
            threads: ThreadTable::new(config.max_threads),
            policy,
            quantum: config.quantum,
            stats: TimerStats::default(),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn sleepers(&self) -> &SleepQueue {
        &self.sleepers
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    /// Claim a slot for a runtime thread
    pub fn register_thread(&mut self, context: CpuContext) -> SchedulerResult<ThreadId> {
        let id = self.threads.register(context)?;
        log::debug!("[SCHED] thread {} registered", id);
        Ok(id)
    }

    /// Drop a thread's slot; it must not be sleeping or queued
    pub fn release_thread(&mut self, id: ThreadId) -> SchedulerResult<()> {
        self.threads.release(id)?;
        log::debug!("[SCHED] thread {} released", id);
        Ok(())
    }

    pub fn is_sleeping(&self, thread: ThreadId) -> bool {
        self.threads.tag(thread) == Ok(QueueTag::InSleepQueue)
    }

    /// Put the running thread to sleep until `deadline` and dispatch the
    /// next one.
    ///
    /// Nothing changes if the insertion is refused.
    pub fn begin_sleep(&mut self, deadline: u64) -> SchedulerResult<SleepTicket> {
        let current = self.policy.current();
        self.sleepers.insert(&mut self.threads, deadline, current)?;
        log::trace!("[SLEEP] thread {} until {} ns", current, deadline);

        let next = self.policy.pick_next();
        let switch = self.plan_switch(current, next);
        Ok(SleepTicket {
            thread: current,
            switch,
        })
    }

    /// Cancel the sleeper registered under `deadline` and make it ready.
    ///
    /// `None` when no such sleeper exists, typically because expiry got
    /// there first.
    pub fn cancel_sleep(&mut self, deadline: u64) -> Option<ThreadId> {
        match self.sleepers.remove(&mut self.threads, deadline) {
            Some(thread) => {
                self.stats.cancellations += 1;
                self.wake(thread);
                self.flush_handoff();
                Some(thread)
            }
            None => {
                log::debug!("[SLEEP] cancel {} ns: no sleeper (already expired?)", deadline);
                None
            }
        }
    }

    /// Take `thread` out of the sleep queue without readmitting it, for
    /// thread teardown. Returns the deadline it was sleeping until.
    pub fn cancel_thread_sleep(&mut self, thread: ThreadId) -> Option<u64> {
        let deadline = self.sleepers.remove_thread(&mut self.threads, thread)?;
        self.stats.cancellations += 1;
        Some(deadline)
    }

    /// Abort if tags and structures disagree on any thread's membership
    pub fn assert_consistent(&self) {
        let mut tagged_sleeping = 0;
        let mut tagged_handoff = 0;
        for (thread, tag) in self.threads.iter() {
            match tag {
                QueueTag::InSleepQueue => {
                    tagged_sleeping += 1;
                    if !self.sleepers.contains(thread) {
                        invariant_violated("sleep queue", "sleeping tag without entry", &self.sleepers.dump());
                    }
                }
                QueueTag::InReadyQueue(id) if id == self.handoff.id() => tagged_handoff += 1,
                _ => {}
            }
        }
        crate::sched_assert!(
            tagged_sleeping == self.sleepers.len(),
            "sleep queue",
            "entry without sleeping tag",
            self.sleepers.dump()
        );
        // bounded: a corrupted list may loop
        let linked = self
            .handoff
            .iter(&self.threads)
            .take(self.threads.capacity() + 1)
            .count();
        crate::sched_assert!(
            tagged_handoff == self.handoff.len() && linked == tagged_handoff,
            "ready queue",
            "hand-off length disagrees with tags",
            self.handoff.dump(&self.threads)
        );
    }

    /// Stage `thread` for admission, counting redundant attempts
    pub(crate) fn hand_off(&mut self, thread: ThreadId) {
        if !self.handoff.enqueue(&mut self.threads, thread) {
            self.stats.redundant_enqueues += 1;
        }
    }

    /// Admit staged threads to the policy in FIFO order
    pub(crate) fn flush_handoff(&mut self) {
        while let Some(thread) = self.handoff.dequeue(&mut self.threads) {
            self.policy.add_ready(thread);
        }
    }

    pub(crate) fn plan_switch(&mut self, from: ThreadId, to: ThreadId) -> Option<SwitchPlan> {
        match SwitchPlan::between(&mut self.threads, from, to) {
            Ok(Some(plan)) => {
                self.stats.context_switches += 1;
                Some(plan)
            }
            Ok(None) => None,
            Err(err) => {
                log::error!("[SCHED] policy dispatched {} -> {}: {}", from, to, err);
                None
            }
        }
    }
}
