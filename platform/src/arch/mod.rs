//! Hardware abstraction
//!
//! Everything the timer core needs from the board goes through [`Hal`]:
//! interrupt masking, port I/O for the PIT, the PIC end-of-interrupt, the
//! monotonic nanosecond source and the stack switch. The bare-metal PC
//! implementation lives in `x86_64`; tests provide their own.

use crate::scheduler::CpuContext;
use crate::time::NanoClock;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

/// Board services consumed by the timer core
pub trait Hal: NanoClock {
    /// Has the runtime finished booting? Read-only from this layer.
    fn runtime_booted(&self) -> bool;

    /// Is the interrupt flag currently set?
    fn interrupts_enabled(&self) -> bool;

    /// Mask maskable interrupts
    fn disable_interrupts(&self);

    /// Unmask maskable interrupts
    fn enable_interrupts(&self);

    /// Enable interrupts, halt until the next one, mask again
    fn wait_for_interrupt(&self);

    /// Write one byte to an I/O port
    fn port_write(&self, port: u16, value: u8);

    /// Acknowledge the timer IRQ at the interrupt controller
    fn end_of_interrupt(&self);

    /// Save the running context into `from` and resume `to`.
    ///
    /// Returns when some later switch resumes `from`.
    ///
    /// # Safety
    /// Both pointers must designate live thread slots, `to` must hold a
    /// context saved by a previous switch or built by
    /// [`CpuContext::prepare`], and no borrow of the thread table may be
    /// held across the call.
    unsafe fn switch_context(&self, from: *mut CpuContext, to: *const CpuContext);
}

/// RAII guard for disabling/restoring interrupts
///
/// Interrupts are re-enabled on drop only if they were enabled when the
/// guard was created, so guards nest.
pub struct InterruptGuard<'a, H: Hal + ?Sized> {
    hal: &'a H,
    was_enabled: bool,
}

impl<'a, H: Hal + ?Sized> InterruptGuard<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        let was_enabled = hal.interrupts_enabled();
        if was_enabled {
            hal.disable_interrupts();
        }
        Self { hal, was_enabled }
    }

    /// Were interrupts enabled before this guard?
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<'a, H: Hal + ?Sized> Drop for InterruptGuard<'a, H> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.hal.enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct FlagHal {
        enabled: Cell<bool>,
        toggles: Cell<u32>,
    }

    impl NanoClock for FlagHal {
        fn now_nanos(&self) -> u64 {
            0
        }
    }

    impl Hal for FlagHal {
        fn runtime_booted(&self) -> bool {
            true
        }
        fn interrupts_enabled(&self) -> bool {
            self.enabled.get()
        }
        fn disable_interrupts(&self) {
            self.enabled.set(false);
            self.toggles.set(self.toggles.get() + 1);
        }
        fn enable_interrupts(&self) {
            self.enabled.set(true);
            self.toggles.set(self.toggles.get() + 1);
        }
        fn wait_for_interrupt(&self) {}
        fn port_write(&self, _port: u16, _value: u8) {}
        fn end_of_interrupt(&self) {}
        unsafe fn switch_context(&self, _from: *mut CpuContext, _to: *const CpuContext) {}
    }

    #[test]
    fn test_guard_masks_and_restores() {
        let hal = FlagHal { enabled: Cell::new(true), toggles: Cell::new(0) };
        {
            let guard = InterruptGuard::new(&hal);
            assert!(guard.was_enabled());
            assert!(!hal.interrupts_enabled());
        }
        assert!(hal.interrupts_enabled());
        assert_eq!(hal.toggles.get(), 2);
    }

    #[test]
    fn test_nested_guard_keeps_outer_mask() {
        let hal = FlagHal { enabled: Cell::new(true), toggles: Cell::new(0) };
        let outer = InterruptGuard::new(&hal);
        {
            let inner = InterruptGuard::new(&hal);
            assert!(!inner.was_enabled());
        }
        assert!(!hal.interrupts_enabled());
        drop(outer);
        assert!(hal.interrupts_enabled());
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn bail(hal: &FlagHal) -> Result<(), ()> {
            let _guard = InterruptGuard::new(hal);
            let failed: Result<(), ()> = Err(());
            failed?;
            Ok(())
        }
        let hal = FlagHal { enabled: Cell::new(true), toggles: Cell::new(0) };
        assert!(bail(&hal).is_err());
        assert!(hal.interrupts_enabled());
    }
}
