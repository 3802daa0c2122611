//! Sleep queue
//!
//! Binary min-heap of (deadline, thread) entries. The heap storage is
//! reserved at boot and never grows, so the timer interrupt can pop entries
//! without touching the allocator.
//!
//! Equal deadlines leave in insertion order: every entry carries a sequence
//! number and the heap is ordered on `(deadline, seq)`.

use super::error::{invariant_violated, SchedulerError, SchedulerResult};
use super::thread::{QueueTag, ThreadId, ThreadTable};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

/// A sleeping thread and the time it becomes runnable again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEntry {
    /// Wake-up time, nanoseconds on the platform's monotonic clock
    pub deadline: u64,
    pub thread: ThreadId,
    seq: u64,
}

impl TimerEntry {
    #[inline]
    fn key(&self) -> (u64, u64) {
        (self.deadline, self.seq)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Earliest-deadline-first queue of sleeping threads
pub struct SleepQueue {
    heap: Vec<TimerEntry>,
    capacity: usize,
    next_seq: u64,
}

impl SleepQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Smallest pending deadline
    pub fn peek_min(&self) -> Option<u64> {
        self.heap.first().map(|entry| entry.deadline)
    }

    /// Queue `thread` until `deadline`.
    ///
    /// The thread must be registered and not owned by any queue.
    pub fn insert(&mut self, table: &mut ThreadTable, deadline: u64, thread: ThreadId) -> SchedulerResult<()> {
        if table.tag(thread)?.is_queued() {
            return Err(SchedulerError::AlreadyQueued { thread_id: thread });
        }
        if self.heap.len() >= self.capacity {
            return Err(SchedulerError::SleepQueueFull { capacity: self.capacity });
        }

        let entry = TimerEntry {
            deadline,
            thread,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.heap.push(entry);
        self.sift_up(self.heap.len() - 1);
        table.link_mut(thread).tag = QueueTag::InSleepQueue;
        Ok(())
    }

    /// Remove the entry whose deadline is exactly `deadline`.
    ///
    /// With several entries on the same deadline the oldest one goes first.
    /// A missing key is an ordinary outcome here (the sleeper may already
    /// have expired or been cancelled); callers that just peeked the key
    /// decide whether `None` is fatal.
    pub fn remove(&mut self, table: &mut ThreadTable, deadline: u64) -> Option<ThreadId> {
        let index = self
            .heap
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.deadline == deadline)
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(index, _)| index)?;
        Some(self.take(table, index))
    }

    /// Remove the entry belonging to `thread`, returning its deadline.
    pub fn remove_thread(&mut self, table: &mut ThreadTable, thread: ThreadId) -> Option<u64> {
        let index = self.heap.iter().position(|entry| entry.thread == thread)?;
        let deadline = self.heap[index].deadline;
        self.take(table, index);
        Some(deadline)
    }

    /// Deadline `thread` is sleeping until, if any
    pub fn deadline_of(&self, thread: ThreadId) -> Option<u64> {
        self.heap
            .iter()
            .find(|entry| entry.thread == thread)
            .map(|entry| entry.deadline)
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.deadline_of(thread).is_some()
    }

    /// Entries in heap order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &TimerEntry> + '_ {
        self.heap.iter()
    }

    /// Diagnostic view of the entries
    pub fn dump(&self) -> SleepQueueDump<'_> {
        SleepQueueDump { queue: self }
    }

    fn take(&mut self, table: &mut ThreadTable, index: usize) -> ThreadId {
        let entry = self.heap.swap_remove(index);
        if index < self.heap.len() {
            self.sift_down(index);
            self.sift_up(index);
        }

        let slot = table.link_mut(entry.thread);
        if slot.tag != QueueTag::InSleepQueue {
            invariant_violated("sleep queue", "entry thread not tagged as sleeping", &self.dump());
        }
        slot.unlink();
        entry.thread
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index] >= self.heap[parent] {
                break;
            }
            self.heap.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.heap.swap(index, smallest);
            index = smallest;
        }
    }
}

/// `sleep queue (2/256) [50:#3 200:#1]`
pub struct SleepQueueDump<'a> {
    queue: &'a SleepQueue,
}

impl fmt::Display for SleepQueueDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sleep queue ({}/{}) [", self.queue.len(), self.queue.capacity)?;
        for (i, entry) in self.queue.heap.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", entry.deadline, entry.thread)?;
        }
        write!(f, "]")
    }
}
