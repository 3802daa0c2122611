//! Timer interrupt handler
//!
//! Per pulse, in order: advance the clock, bail out if the runtime is still
//! booting, expire every due sleeper, then consider a quantum rotation.
//! Nothing here switches stacks; a pending switch is returned to the caller,
//! which performs it once the scheduler lock is released.

use super::context::SchedulerContext;
use super::error::invariant_violated;
use super::policy::SchedulerPolicy;
use super::switch::SwitchPlan;
use super::thread::ThreadId;
use crate::time::NanoClock;

impl<P: SchedulerPolicy> SchedulerContext<P> {
    /// Process one hardware pulse.
    ///
    /// `booted` is the runtime's "finished booting" flag; before it is set
    /// only the clock moves.
    pub fn tick<C: NanoClock + ?Sized>(&mut self, clock: &C, booted: bool) -> Option<SwitchPlan> {
        self.stats.pulses += 1;
        self.clock.advance();

        if !booted {
            self.stats.early_pulses += 1;
            return None;
        }

        self.expire_due(clock);
        self.rotate()
    }

    /// Wake every sleeper whose deadline is not after `now_nanos()`
    fn expire_due<C: NanoClock + ?Sized>(&mut self, clock: &C) {
        let mut deadline = match self.sleepers.peek_min() {
            Some(deadline) => deadline,
            None => return,
        };
        let now = clock.now_nanos();

        while now >= deadline {
            let thread = match self.sleepers.remove(&mut self.threads, deadline) {
                Some(thread) => thread,
                None => invariant_violated("sleep queue", "peeked deadline vanished before removal", &self.sleepers.dump()),
            };
            self.stats.expirations += 1;
            log::trace!("[TIMER] thread {} expired ({} ns, now {})", thread, deadline, now);
            self.wake(thread);

            deadline = match self.sleepers.peek_min() {
                Some(next) => next,
                None => break,
            };
        }

        self.flush_handoff();
    }

    /// Hand a woken sleeper to the policy.
    ///
    /// A sleeper idling on the processor it still owns just resumes; it
    /// must not be admitted a second time.
    pub(crate) fn wake(&mut self, thread: ThreadId) {
        if thread == self.policy.current() {
            log::trace!("[TIMER] thread {} resumes in place", thread);
            return;
        }
        self.hand_off(thread);
    }

    /// Re-admit the running thread and dispatch, every `quantum` ticks
    fn rotate(&mut self) -> Option<SwitchPlan> {
        if !self.policy.has_other_runnable() {
            return None;
        }
        if self.clock.ticks() % u64::from(self.quantum) != 0 {
            return None;
        }

        let current = self.policy.current();
        // an idle sleeper keeps its sleep entry, it is not ready
        if !self.is_sleeping(current) {
            self.hand_off(current);
            self.flush_handoff();
        }
        let next = self.policy.pick_next();
        self.stats.rotations += 1;
        self.plan_switch(current, next)
    }
}
