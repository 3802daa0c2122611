//! Scheduler Policy seam
//!
//! The run-queue policy belongs to the runtime's thread management. This
//! layer only decides *when* to consult it: on sleeper expiry, on quantum
//! rotation and when a thread goes to sleep.

use super::thread::ThreadId;

/// Run-queue admission and dispatch, implemented outside this crate
pub trait SchedulerPolicy {
    /// Admit `thread` to the ready set
    fn add_ready(&mut self, thread: ThreadId);

    /// Choose the next thread and make it the current one.
    ///
    /// May return the current thread when nothing else can run.
    fn pick_next(&mut self) -> ThreadId;

    /// Is any thread other than the current one runnable?
    fn has_other_runnable(&self) -> bool;

    /// Thread currently owning the processor
    fn current(&self) -> ThreadId;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    /// Policy call as observed by the tests
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Call {
        AddReady(ThreadId),
        PickNext(ThreadId),
    }

    /// FIFO policy recording every call
    pub(crate) struct RoundRobin {
        pub(crate) ready: VecDeque<ThreadId>,
        pub(crate) current: ThreadId,
        pub(crate) calls: Vec<Call>,
    }

    impl RoundRobin {
        pub(crate) fn running(current: ThreadId) -> Self {
            Self {
                ready: VecDeque::new(),
                current,
                calls: Vec::new(),
            }
        }

        pub(crate) fn admitted(&self) -> Vec<ThreadId> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::AddReady(t) => Some(*t),
                    Call::PickNext(_) => None,
                })
                .collect()
        }
    }

    impl SchedulerPolicy for RoundRobin {
        fn add_ready(&mut self, thread: ThreadId) {
            self.calls.push(Call::AddReady(thread));
            self.ready.push_back(thread);
        }

        fn pick_next(&mut self) -> ThreadId {
            if let Some(next) = self.ready.pop_front() {
                self.current = next;
            }
            self.calls.push(Call::PickNext(self.current));
            self.current
        }

        fn has_other_runnable(&self) -> bool {
            !self.ready.is_empty()
        }

        fn current(&self) -> ThreadId {
            self.current
        }
    }
}
