//! Ready linkage
//!
//! Intrusive FIFO of threads: the `next`/`prev` links and the owner tag live
//! in the thread's own slot, so enqueueing never allocates. A thread may sit
//! on at most one queue at a time. The queue itself is unsynchronized; every
//! caller already runs inside the timer interrupt or under an
//! [`InterruptGuard`](crate::arch::InterruptGuard).

use super::error::invariant_violated;
use super::thread::{alloc_queue_id, QueueId, QueueTag, ThreadId, ThreadTable};
use core::fmt;

/// FIFO of threads linked through their slots
#[derive(Debug)]
pub struct ThreadQueue {
    id: QueueId,
    head: Option<ThreadId>,
    tail: Option<ThreadId>,
    len: usize,
}

impl ThreadQueue {
    pub fn new() -> Self {
        Self {
            id: alloc_queue_id(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Option<ThreadId> {
        self.head
    }

    /// Is `thread` linked on this queue?
    pub fn is_queued(&self, table: &ThreadTable, thread: ThreadId) -> bool {
        table.tag(thread) == Ok(QueueTag::InReadyQueue(self.id))
    }

    /// Append `thread` at the tail.
    ///
    /// A thread that is already owned by any queue (this one included) is
    /// left where it is and `false` is returned; during startup a thread can
    /// legitimately still be considered queued.
    pub fn enqueue(&mut self, table: &mut ThreadTable, thread: ThreadId) -> bool {
        let tag = match table.tag(thread) {
            Ok(tag) => tag,
            Err(err) => {
                log::warn!("[READYQ] enqueue refused: {}", err);
                return false;
            }
        };
        if tag.is_queued() {
            log::debug!("[READYQ] thread {} already queued ({:?}), skipped", thread, tag);
            return false;
        }

        let slot = table.link_mut(thread);
        slot.next = None;
        slot.prev = self.tail;
        slot.tag = QueueTag::InReadyQueue(self.id);

        match self.tail {
            Some(tail) => table.link_mut(tail).next = Some(thread),
            None => self.head = Some(thread),
        }
        self.tail = Some(thread);
        self.len += 1;
        true
    }

    /// Remove and return the head in O(1)
    pub fn dequeue(&mut self, table: &mut ThreadTable) -> Option<ThreadId> {
        let head = self.head?;
        let slot = *table.link(head);
        if slot.tag != QueueTag::InReadyQueue(self.id) {
            invariant_violated("ready queue", "head not owned by queue", &self.dump(table));
        }

        self.head = slot.next;
        match slot.next {
            Some(next) => table.link_mut(next).prev = None,
            None => self.tail = None,
        }
        table.link_mut(head).unlink();
        self.len -= 1;
        Some(head)
    }

    /// Remove `thread` wherever it sits in the queue.
    ///
    /// Returns `false` in O(1) if the thread is not owned by this queue. If
    /// the tag says it is but the list walk cannot find it, the queue is
    /// corrupted and this aborts with a dump.
    pub fn remove(&mut self, table: &mut ThreadTable, thread: ThreadId) -> bool {
        if !self.is_queued(table, thread) {
            return false;
        }

        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current == thread {
                let next = table.link(current).next;
                match prev {
                    Some(p) => table.link_mut(p).next = next,
                    None => self.head = next,
                }
                match next {
                    Some(n) => table.link_mut(n).prev = prev,
                    None => self.tail = prev,
                }
                table.link_mut(thread).unlink();
                self.len -= 1;
                return true;
            }
            prev = cursor;
            cursor = table.link(current).next;
        }

        log::error!("[READYQ] could not remove thread {} from queue {:?}", thread, self.id);
        invariant_violated("ready queue", "tagged thread missing from list", &self.dump(table))
    }

    /// Members from head to tail
    pub fn iter<'a>(&self, table: &'a ThreadTable) -> Iter<'a> {
        Iter {
            table,
            cursor: self.head,
        }
    }

    /// Diagnostic view of the list
    pub fn dump<'a>(&'a self, table: &'a ThreadTable) -> QueueDump<'a> {
        QueueDump { queue: self, table }
    }
}

impl Default for ThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail walk over a [`ThreadQueue`]
pub struct Iter<'a> {
    table: &'a ThreadTable,
    cursor: Option<ThreadId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<ThreadId> {
        let current = self.cursor?;
        self.cursor = self.table.link(current).next;
        Some(current)
    }
}

/// `[#1 #4 #2] head: #1 tail: #2`
pub struct QueueDump<'a> {
    queue: &'a ThreadQueue,
    table: &'a ThreadTable,
}

impl fmt::Display for QueueDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ready queue {:?} [", self.queue.id)?;
        // bounded walk: a corrupted list may contain a cycle
        let mut cursor = self.queue.head;
        let mut shown = 0;
        while let Some(current) = cursor {
            if shown > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", current)?;
            shown += 1;
            if shown > self.table.capacity() {
                write!(f, " ...")?;
                break;
            }
            cursor = self.table.link(current).next;
        }
        write!(f, "]")?;
        match self.queue.head {
            Some(head) => write!(f, " head: {}", head)?,
            None => write!(f, " head: null")?,
        }
        match self.queue.tail {
            Some(tail) => write!(f, " tail: {}", tail),
            None => write!(f, " tail: null"),
        }
    }
}
