//! System timer service
//!
//! Boot-constructed owner of the hardware abstraction and the scheduler
//! context. The interrupt stub calls [`SystemTimer::handle_pulse`]; thread
//! management calls the sleep / cancel / registration operations.
//!
//! Locking discipline: non-interrupt code only takes the context lock while
//! an [`InterruptGuard`] is held, so the handler can never spin on a lock
//! owned by the code it interrupted.

use crate::arch::{Hal, InterruptGuard};
use crate::config::{ConfigError, PlatformConfig};
use crate::scheduler::{
    CpuContext, SchedulerContext, SchedulerPolicy, SchedulerResult, ThreadId, TimerStats,
};
use crate::time::{deadline_after, NanoClock, PulseRate};
use core::time::Duration;
use spin::Mutex;

/// Hardware timer plus the timer-side scheduler state
pub struct SystemTimer<H: Hal, P: SchedulerPolicy> {
    hal: H,
    rate: PulseRate,
    context: Mutex<SchedulerContext<P>>,
}

impl<H: Hal, P: SchedulerPolicy> SystemTimer<H, P> {
    /// Program the pulse rate and build empty timer state.
    ///
    /// Run once during platform boot, before the timer IRQ is unmasked.
    pub fn boot(config: PlatformConfig, hal: H, policy: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let rate = PulseRate::new(config.pit_source_hz, config.ticks_per_second)?;
        rate.program(&hal);

        log::info!(
            "[TIMER] PIT divisor {} ({} ns/pulse, drift {} ns), quantum {} ticks",
            rate.divisor(),
            rate.period_ns(),
            rate.drift_per_pulse_ns(),
            config.quantum
        );
        if !rate.tracks_remainder(config.pulse_remainder_ns) {
            log::warn!(
                "[TIMER] pulse remainder {} ns does not match PIT drift {} ns: ticks will not follow real time",
                config.pulse_remainder_ns,
                rate.drift_per_pulse_ns()
            );
        }

        Ok(Self {
            hal,
            rate,
            context: Mutex::new(SchedulerContext::new(&config, policy)),
        })
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn rate(&self) -> PulseRate {
        self.rate
    }

    /// Timer IRQ entry.
    ///
    /// The controller is acknowledged before any switch: the thread being
    /// resumed may not come back through this path for a long time.
    pub fn handle_pulse(&self) {
        let booted = self.hal.runtime_booted();
        let plan = self.context.lock().tick(&self.hal, booted);
        self.hal.end_of_interrupt();

        if let Some(plan) = plan {
            // SAFETY: the plan points at live slots and the lock is released
            unsafe { self.hal.switch_context(plan.from_ctx, plan.to_ctx) };
        }
    }

    /// Suspend the running thread until `now_nanos() >= deadline`.
    ///
    /// Returns once the thread has been woken (by expiry or an explicit
    /// cancel) and dispatched again. Fails without side effects when the
    /// thread cannot be queued.
    pub fn sleep_until(&self, deadline: u64) -> SchedulerResult<()> {
        let _guard = InterruptGuard::new(&self.hal);

        let ticket = self.context.lock().begin_sleep(deadline)?;
        match ticket.switch {
            Some(plan) => {
                // SAFETY: see handle_pulse
                unsafe { self.hal.switch_context(plan.from_ctx, plan.to_ctx) };
            }
            None => self.idle_until_woken(ticket.thread),
        }
        Ok(())
    }

    /// Relative form of [`sleep_until`](Self::sleep_until)
    pub fn sleep_for(&self, delay: Duration) -> SchedulerResult<()> {
        self.sleep_until(deadline_after(self.hal.now_nanos(), delay))
    }

    /// Wake the sleeper registered under `deadline` ahead of time.
    ///
    /// `None` if it already expired or was cancelled.
    pub fn cancel_sleep(&self, deadline: u64) -> Option<ThreadId> {
        let _guard = InterruptGuard::new(&self.hal);
        self.context.lock().cancel_sleep(deadline)
    }

    /// Drop `thread`'s sleep entry without waking it (thread teardown)
    pub fn cancel_thread_sleep(&self, thread: ThreadId) -> Option<u64> {
        let _guard = InterruptGuard::new(&self.hal);
        self.context.lock().cancel_thread_sleep(thread)
    }

    pub fn register_thread(&self, context: CpuContext) -> SchedulerResult<ThreadId> {
        let _guard = InterruptGuard::new(&self.hal);
        self.context.lock().register_thread(context)
    }

    pub fn release_thread(&self, thread: ThreadId) -> SchedulerResult<()> {
        let _guard = InterruptGuard::new(&self.hal);
        self.context.lock().release_thread(thread)
    }

    /// Milliseconds since boot
    pub fn ticks(&self) -> u64 {
        self.with_context(|ctx| ctx.clock().ticks())
    }

    pub fn uptime(&self) -> Duration {
        self.with_context(|ctx| ctx.clock().uptime())
    }

    pub fn stats(&self) -> TimerStats {
        self.with_context(|ctx| ctx.stats())
    }

    /// Run `f` on the scheduler context with the timer IRQ excluded.
    ///
    /// `f` must not sleep or switch threads.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut SchedulerContext<P>) -> R) -> R {
        let _guard = InterruptGuard::new(&self.hal);
        f(&mut *self.context.lock())
    }

    /// The policy handed the processor back to the sleeper: halt until the
    /// handler expires it, or until something else becomes runnable.
    fn idle_until_woken(&self, me: ThreadId) {
        log::trace!("[SLEEP] thread {} idles", me);
        loop {
            self.hal.wait_for_interrupt();

            let plan = {
                let mut ctx = self.context.lock();
                if !ctx.is_sleeping(me) {
                    return;
                }
                if !ctx.policy().has_other_runnable() {
                    continue;
                }
                let next = ctx.policy_mut().pick_next();
                ctx.plan_switch(me, next)
            };

            if let Some(plan) = plan {
                // SAFETY: see handle_pulse
                unsafe { self.hal.switch_context(plan.from_ctx, plan.to_ctx) };
                return;
            }
        }
    }
}
