//! Shared fixtures for the integration tests

#![allow(dead_code)]

use jam_platform::{CpuContext, Hal, NanoClock, SchedulerPolicy, ThreadId};
use spin::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Hardware side effect observed by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Port(u16, u8),
    Eoi,
    /// Stack pointer of the context being resumed
    Switch(u64),
}

#[derive(Default)]
pub struct MockState {
    pub now: AtomicU64,
    pub booted: AtomicBool,
    pub interrupts: AtomicBool,
    pub waits: AtomicUsize,
    pub events: Mutex<Vec<Event>>,
    on_wait: Mutex<Option<fn()>>,
}

/// Recording `Hal`; clones share state so a test keeps a handle after boot
#[derive(Clone, Default)]
pub struct MockHal {
    pub state: Arc<MockState>,
}

impl MockHal {
    /// Booted, interrupts enabled, time zero
    pub fn booted() -> Self {
        let hal = Self::default();
        hal.state.booted.store(true, Ordering::SeqCst);
        hal.state.interrupts.store(true, Ordering::SeqCst);
        hal
    }

    pub fn set_now(&self, nanos: u64) {
        self.state.now.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: u64) {
        self.state.now.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Run `hook` each time the caller halts waiting for an interrupt
    pub fn on_wait(&self, hook: fn()) {
        *self.state.on_wait.lock() = Some(hook);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.state.events.lock().clear();
    }

    pub fn switches(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Switch(rsp) => Some(rsp),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.state.events.lock().push(event);
    }
}

impl NanoClock for MockHal {
    fn now_nanos(&self) -> u64 {
        self.state.now.load(Ordering::SeqCst)
    }
}

impl Hal for MockHal {
    fn runtime_booted(&self) -> bool {
        self.state.booted.load(Ordering::SeqCst)
    }

    fn interrupts_enabled(&self) -> bool {
        self.state.interrupts.load(Ordering::SeqCst)
    }

    fn disable_interrupts(&self) {
        self.state.interrupts.store(false, Ordering::SeqCst);
    }

    fn enable_interrupts(&self) {
        self.state.interrupts.store(true, Ordering::SeqCst);
    }

    fn wait_for_interrupt(&self) {
        self.state.waits.fetch_add(1, Ordering::SeqCst);
        let hook = *self.state.on_wait.lock();
        let was_enabled = self.state.interrupts.swap(true, Ordering::SeqCst);
        if let Some(hook) = hook {
            hook();
        }
        self.state.interrupts.store(was_enabled, Ordering::SeqCst);
    }

    fn port_write(&self, port: u16, value: u8) {
        self.record(Event::Port(port, value));
    }

    fn end_of_interrupt(&self) {
        self.record(Event::Eoi);
    }

    unsafe fn switch_context(&self, _from: *mut CpuContext, to: *const CpuContext) {
        self.record(Event::Switch((*to).rsp));
    }
}

/// FIFO policy; `pick_next` keeps the current thread when nothing is ready
pub struct RoundRobin {
    pub ready: VecDeque<ThreadId>,
    pub current: ThreadId,
}

impl RoundRobin {
    pub fn running(current: ThreadId) -> Self {
        Self {
            ready: VecDeque::new(),
            current,
        }
    }

    pub fn with_ready(mut self, thread: ThreadId) -> Self {
        self.ready.push_back(thread);
        self
    }
}

impl SchedulerPolicy for RoundRobin {
    fn add_ready(&mut self, thread: ThreadId) {
        self.ready.push_back(thread);
    }

    fn pick_next(&mut self) -> ThreadId {
        if let Some(next) = self.ready.pop_front() {
            self.current = next;
        }
        self.current
    }

    fn has_other_runnable(&self) -> bool {
        !self.ready.is_empty()
    }

    fn current(&self) -> ThreadId {
        self.current
    }
}

/// Stack pointer given to thread `n` by [`register_threads`]
pub fn stack_of(n: u32) -> u64 {
    0x1_0000 * (u64::from(n) + 1)
}

pub fn register_threads<H: Hal, P: SchedulerPolicy>(
    timer: &jam_platform::SystemTimer<H, P>,
    count: u32,
) -> Vec<ThreadId> {
    (0..count)
        .map(|n| {
            timer
                .register_thread(CpuContext::with_stack_pointer(stack_of(n)))
                .unwrap()
        })
        .collect()
}
