//! Backend PC x86_64 (bare-metal)
//!
//! PIC 8259 maître, PIT 8254 sur l'IRQ0, TSC comme source monotone en
//! nanosecondes. Compilé uniquement pour `target_os = "none"`.

use super::Hal;
use crate::scheduler::CpuContext;
use crate::time::NanoClock;
use core::arch::{asm, global_asm};
use core::arch::x86_64::_rdtsc;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Port de commande du PIC maître
const PIC1_COMMAND: u16 = 0x20;
/// End of Interrupt
const PIC_EOI: u8 = 0x20;

/// Interrupt flag dans RFLAGS
const RFLAGS_IF: u64 = 1 << 9;

/// Fréquence TSC en Hz (calibrée au boot)
static TSC_FREQ_HZ: AtomicU64 = AtomicU64::new(0);
/// Valeur TSC au boot
static TSC_START: AtomicU64 = AtomicU64::new(0);
/// Positionné une fois par la séquence de boot de la VM
static RUNTIME_BOOTED: AtomicBool = AtomicBool::new(false);

// Sauvegarde RBP, RBX, R12-R15 sur la pile sortante, échange RSP, restaure.
// rdi = *mut CpuContext (sortant), rsi = *const CpuContext (entrant)
global_asm!(
    ".global jam_switch_context",
    "jam_switch_context:",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov [rdi], rsp",
    "mov rsp, [rsi]",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
);

extern "C" {
    fn jam_switch_context(from: *mut CpuContext, to: *const CpuContext);
}

/// Services matériels du PC
#[derive(Debug, Clone, Copy, Default)]
pub struct PcHal;

impl PcHal {
    /// Enregistre la fréquence TSC mesurée au boot et l'origine du temps
    pub fn calibrate(tsc_hz: u64) {
        TSC_FREQ_HZ.store(tsc_hz, Ordering::Relaxed);
        TSC_START.store(read_tsc(), Ordering::Relaxed);
        log::info!("[TIMER] TSC {} Hz", tsc_hz);
    }

    /// Appelé une seule fois quand le runtime a fini de booter
    pub fn mark_runtime_booted() {
        RUNTIME_BOOTED.store(true, Ordering::Release);
    }
}

#[inline]
fn read_tsc() -> u64 {
    unsafe { _rdtsc() }
}

#[inline]
unsafe fn outb(port: u16, value: u8) {
    asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
}

impl NanoClock for PcHal {
    fn now_nanos(&self) -> u64 {
        let freq = TSC_FREQ_HZ.load(Ordering::Relaxed);
        if freq == 0 {
            return 0;
        }
        let cycles = read_tsc().saturating_sub(TSC_START.load(Ordering::Relaxed));
        // ns = cycles * 1e9 / freq, en 128 bits pour éviter le débordement
        let ns = cycles as u128 * 1_000_000_000 / freq as u128;
        u64::try_from(ns).unwrap_or(u64::MAX)
    }
}

impl Hal for PcHal {
    fn runtime_booted(&self) -> bool {
        RUNTIME_BOOTED.load(Ordering::Acquire)
    }

    fn interrupts_enabled(&self) -> bool {
        let rflags: u64;
        unsafe {
            asm!("pushfq", "pop {}", out(reg) rflags, options(nomem, preserves_flags));
        }
        rflags & RFLAGS_IF != 0
    }

    fn disable_interrupts(&self) {
        unsafe { asm!("cli", options(nomem, nostack)) };
    }

    fn enable_interrupts(&self) {
        unsafe { asm!("sti", options(nomem, nostack)) };
    }

    fn wait_for_interrupt(&self) {
        // sti ne prend effet qu'après l'instruction suivante: pas de fenêtre
        // entre sti et hlt
        unsafe { asm!("sti", "hlt", "cli", options(nomem, nostack)) };
    }

    fn port_write(&self, port: u16, value: u8) {
        unsafe { outb(port, value) };
    }

    fn end_of_interrupt(&self) {
        // IRQ0 est sur le maître: pas d'EOI esclave
        unsafe { outb(PIC1_COMMAND, PIC_EOI) };
    }

    unsafe fn switch_context(&self, from: *mut CpuContext, to: *const CpuContext) {
        jam_switch_context(from, to);
    }
}
