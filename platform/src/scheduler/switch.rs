//! Context switch primitive
//!
//! Relinquishing the processor is a plain stack switch: the outgoing thread
//! pushes its callee-saved registers (RBP, RBX, R12-R15) on its own stack,
//! stores RSP in its [`CpuContext`], loads the incoming thread's RSP, pops
//! and returns into it. The core computes a [`SwitchPlan`] while the
//! scheduler lock is held; the switch itself happens after the lock is
//! released.

use super::error::SchedulerResult;
use super::thread::{ThreadId, ThreadTable};

/// Number of callee-saved registers pushed by the switch routine
pub const SAVED_REGISTERS: usize = 6;

/// Saved thread context (windowed - only RSP, registers live on the stack)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuContext {
    /// Stack pointer (RSP)
    pub rsp: u64,
}

impl CpuContext {
    pub const fn empty() -> Self {
        Self { rsp: 0 }
    }

    pub const fn with_stack_pointer(rsp: u64) -> Self {
        Self { rsp }
    }

    /// Build the first frame of a new thread on `stack`.
    ///
    /// Layout from the returned RSP upwards: six zeroed callee-saved slots,
    /// `entry`, then a null return address so that `entry` starts with the
    /// SysV alignment of a called function (RSP + 8 multiple of 16).
    /// `entry` starts with interrupts masked, as every switch runs with
    /// them masked. Returns `None` when the stack is too small to hold the
    /// frame.
    pub fn prepare(stack: &mut [u64], entry: extern "C" fn() -> !) -> Option<Self> {
        let base = stack.as_ptr() as usize;
        let end = base + stack.len() * core::mem::size_of::<u64>();
        let top = end & !0xF;
        let top_index = match top.checked_sub(base) {
            Some(bytes) => bytes / core::mem::size_of::<u64>(),
            None => return None,
        };

        let frame = SAVED_REGISTERS + 2;
        if top_index < frame {
            return None;
        }

        stack[top_index - 1] = 0;
        stack[top_index - 2] = entry as usize as u64;
        for slot in &mut stack[top_index - frame..top_index - 2] {
            *slot = 0;
        }

        let rsp = top - frame * core::mem::size_of::<u64>();
        Some(Self { rsp: rsp as u64 })
    }
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// A pending switch from the running thread to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchPlan {
    pub from: ThreadId,
    pub to: ThreadId,
    pub from_ctx: *mut CpuContext,
    pub to_ctx: *const CpuContext,
}

impl SwitchPlan {
    /// Plan a switch between two registered threads; `None` if they are
    /// the same thread.
    pub fn between(table: &mut ThreadTable, from: ThreadId, to: ThreadId) -> SchedulerResult<Option<Self>> {
        if from == to {
            return Ok(None);
        }
        let from_ctx = table.context_ptr(from)?;
        let to_ctx = table.context_ptr(to)? as *const CpuContext;
        Ok(Some(Self {
            from,
            to,
            from_ctx,
            to_ctx,
        }))
    }
}
