//! Thread slot table
//!
//! The runtime owns its thread objects; this layer only needs, per thread,
//! the queue linkage and the saved register context. Those live in a slot
//! arena allocated once at boot, and a [`ThreadId`] is the slot index. Queue
//! membership is an explicit [`QueueTag`] instead of a back-pointer, so the
//! single-membership check stays O(1) without aliasing pointers.

use super::error::{SchedulerError, SchedulerResult};
use super::switch::CpuContext;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU16, Ordering};

/// Thread slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a ready-linkage queue instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u16);

static NEXT_QUEUE_ID: AtomicU16 = AtomicU16::new(1);

/// Allocate a new queue identity
pub(crate) fn alloc_queue_id() -> QueueId {
    QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Which structure, if any, currently owns a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueTag {
    #[default]
    Unqueued,
    InSleepQueue,
    InReadyQueue(QueueId),
}

impl QueueTag {
    #[inline]
    pub const fn is_queued(self) -> bool {
        !matches!(self, Self::Unqueued)
    }
}

/// Per-thread bookkeeping
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreadSlot {
    pub(crate) in_use: bool,
    pub(crate) tag: QueueTag,
    pub(crate) next: Option<ThreadId>,
    pub(crate) prev: Option<ThreadId>,
    pub(crate) context: CpuContext,
}

impl ThreadSlot {
    const fn vacant() -> Self {
        Self {
            in_use: false,
            tag: QueueTag::Unqueued,
            next: None,
            prev: None,
            context: CpuContext::empty(),
        }
    }

    /// Reset linkage after leaving a queue
    #[inline]
    pub(crate) fn unlink(&mut self) {
        self.tag = QueueTag::Unqueued;
        self.next = None;
        self.prev = None;
    }
}

/// Fixed-capacity slot arena
///
/// Slots never move once allocated, so context pointers handed to the
/// switch routine remain valid for the life of the table.
pub struct ThreadTable {
    slots: Box<[ThreadSlot]>,
    live: usize,
}

impl ThreadTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, ThreadSlot::vacant());
        Self {
            slots: slots.into_boxed_slice(),
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Claim a free slot for a thread whose initial context is `context`
    pub fn register(&mut self, context: CpuContext) -> SchedulerResult<ThreadId> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.in_use)
            .ok_or(SchedulerError::ThreadLimitReached { max: self.slots.len() })?;

        let slot = &mut self.slots[index];
        *slot = ThreadSlot::vacant();
        slot.in_use = true;
        slot.context = context;
        self.live += 1;
        Ok(ThreadId(index as u32))
    }

    /// Give a slot back. The thread must not be on any queue.
    pub fn release(&mut self, id: ThreadId) -> SchedulerResult<()> {
        let slot = self.slot(id)?;
        if slot.tag.is_queued() {
            return Err(SchedulerError::ThreadStillQueued { thread_id: id });
        }
        self.slots[id.index()] = ThreadSlot::vacant();
        self.live -= 1;
        Ok(())
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.slot(id).is_ok()
    }

    /// Current owner of a registered thread
    pub fn tag(&self, id: ThreadId) -> SchedulerResult<QueueTag> {
        self.slot(id).map(|slot| slot.tag)
    }

    /// Saved context pointer, stable for the table's lifetime
    pub fn context_ptr(&mut self, id: ThreadId) -> SchedulerResult<*mut CpuContext> {
        self.validate(id)?;
        Ok(&mut self.slots[id.index()].context as *mut CpuContext)
    }

    /// Registered threads and their tags
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, QueueTag)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.in_use)
            .map(|(index, slot)| (ThreadId(index as u32), slot.tag))
    }

    pub(crate) fn validate(&self, id: ThreadId) -> SchedulerResult<()> {
        self.slot(id).map(|_| ())
    }

    fn slot(&self, id: ThreadId) -> SchedulerResult<&ThreadSlot> {
        match self.slots.get(id.index()) {
            Some(slot) if slot.in_use => Ok(slot),
            _ => Err(SchedulerError::InvalidThread { thread_id: id }),
        }
    }

    /// Linkage of a thread already known to be registered
    #[inline]
    pub(crate) fn link(&self, id: ThreadId) -> &ThreadSlot {
        &self.slots[id.index()]
    }

    #[inline]
    pub(crate) fn link_mut(&mut self, id: ThreadId) -> &mut ThreadSlot {
        &mut self.slots[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let mut table = ThreadTable::new(2);
        let a = table.register(CpuContext::empty()).unwrap();
        let b = table.register(CpuContext::empty()).unwrap();
        assert_eq!((a, b), (ThreadId(0), ThreadId(1)));
        assert_eq!(
            table.register(CpuContext::empty()),
            Err(SchedulerError::ThreadLimitReached { max: 2 })
        );

        table.release(a).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.register(CpuContext::empty()), Ok(ThreadId(0)));
    }

    #[test]
    fn test_unknown_thread() {
        let mut table = ThreadTable::new(4);
        assert_eq!(
            table.tag(ThreadId(2)),
            Err(SchedulerError::InvalidThread { thread_id: ThreadId(2) })
        );
        assert!(table.release(ThreadId(9)).is_err());
        assert!(table.context_ptr(ThreadId(0)).is_err());
    }

    #[test]
    fn test_queued_thread_cannot_be_released() {
        let mut table = ThreadTable::new(1);
        let t = table.register(CpuContext::empty()).unwrap();
        table.link_mut(t).tag = QueueTag::InSleepQueue;
        assert_eq!(table.release(t), Err(SchedulerError::ThreadStillQueued { thread_id: t }));
    }

    #[test]
    fn test_context_pointer_is_stable() {
        let mut table = ThreadTable::new(3);
        let t = table.register(CpuContext::with_stack_pointer(0x8000)).unwrap();
        let before = table.context_ptr(t).unwrap();
        table.register(CpuContext::empty()).unwrap();
        table.register(CpuContext::empty()).unwrap();
        assert_eq!(table.context_ptr(t).unwrap(), before);
        assert_eq!(unsafe { (*before).rsp }, 0x8000);
    }
}
