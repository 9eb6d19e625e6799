//! Host shim for testing on non-Cortex-M machines.
//!
//! No context switching occurs. Each std thread plays the role of one
//! execution context; masking interrupts takes a process-wide lock so that
//! two contexts can never be inside a masked section at once, which is the
//! exclusion a single-core CPU gets from PRIMASK. Pended switches and the
//! tick counter are recorded per std thread so parallel tests stay isolated.

use super::Arch;
use core::cell::Cell;
use portable_atomic::{AtomicBool, Ordering};

/// Held while some context has interrupts masked.
static MASK: AtomicBool = AtomicBool::new(false);

std::thread_local! {
    static MASKED: Cell<bool> = const { Cell::new(false) };
    static PENDED: Cell<usize> = const { Cell::new(0) };
    static TICK_RELOAD: Cell<u32> = const { Cell::new(0) };
    static TICK_VALUE: Cell<u32> = const { Cell::new(0) };
}

pub struct HostArch;

impl Arch for HostArch {
    fn enable_interrupts() {
        if MASKED.with(|m| m.replace(false)) {
            MASK.store(false, Ordering::Release);
            // Pending "interrupts" (other std threads) get their chance here.
            std::thread::yield_now();
        }
    }

    fn disable_interrupts() {
        if MASKED.with(|m| m.get()) {
            return;
        }
        while MASK
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::thread::yield_now();
        }
        MASKED.with(|m| m.set(true));
    }

    fn interrupts_enabled() -> bool {
        !MASKED.with(|m| m.get())
    }

    fn request_context_switch() {
        PENDED.with(|p| p.set(p.get() + 1));
    }

    fn start_tick(reload: u32) {
        TICK_RELOAD.with(|r| r.set(reload));
        TICK_VALUE.with(|v| v.set(reload));
    }

    fn tick_value() -> u32 {
        TICK_VALUE.with(|v| v.get())
    }

    fn wait_for_interrupt() {
        std::thread::yield_now();
    }

    unsafe fn start_first_thread(_sp: usize) -> ! {
        panic!("the host shim cannot enter a thread context");
    }
}

/// Number of context switches pended on this std thread since the last call.
pub fn take_pended_switches() -> usize {
    PENDED.with(|p| p.replace(0))
}

/// Reload value last passed to [`Arch::start_tick`] on this std thread.
pub fn tick_reload() -> u32 {
    TICK_RELOAD.with(|r| r.get())
}

/// Set what [`Arch::tick_value`] reports on this std thread.
pub fn set_tick_value(value: u32) {
    TICK_VALUE.with(|v| v.set(value));
}
