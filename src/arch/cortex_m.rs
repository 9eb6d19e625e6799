//! Cortex-M4 implementation: PRIMASK masking, SysTick tick source and a
//! PendSV context switch.
//!
//! PendSV runs at the lowest priority and SysTick one level above it, so every
//! list mutation done by the tick handler completes before a pended switch
//! executes. Threads run privileged on the process stack (PSP); handlers use
//! the main stack.

use super::Arch;
use core::arch::{asm, global_asm};
use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

/// Priority byte for PendSV (lowest).
const PENDSV_PRIORITY: u8 = 0xFF;
/// Priority byte for SysTick. The TM4C123 implements the top three bits,
/// so this is level 6, one above PendSV's 7.
const SYSTICK_PRIORITY: u8 = 0xC0;

pub struct CortexM4;

impl Arch for CortexM4 {
    fn enable_interrupts() {
        unsafe { cortex_m::interrupt::enable() }
    }

    fn disable_interrupts() {
        cortex_m::interrupt::disable();
    }

    fn interrupts_enabled() -> bool {
        cortex_m::register::primask::read().is_active()
    }

    fn request_context_switch() {
        SCB::set_pendsv();
    }

    fn start_tick(reload: u32) {
        // Launch runs once with interrupts masked; nothing else owns the core
        // peripherals at that point.
        let mut cp = unsafe { cortex_m::Peripherals::steal() };
        unsafe {
            cp.SCB.set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
            cp.SCB.set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);
        }
        cp.SYST.disable_counter();
        cp.SYST.set_clock_source(SystClkSource::Core);
        cp.SYST.set_reload(reload.saturating_sub(1));
        cp.SYST.clear_current();
        cp.SYST.enable_interrupt();
        cp.SYST.enable_counter();
    }

    fn tick_value() -> u32 {
        SYST::get_current()
    }

    fn wait_for_interrupt() {
        cortex_m::asm::wfi();
    }

    unsafe fn start_first_thread(sp: usize) -> ! {
        unsafe {
            asm!(
                "ldr r1, [r0, #56]",   // lr slot
                "ldr r2, [r0, #60]",   // pc slot
                "adds r0, r0, #68",    // drop the whole frame
                "msr psp, r0",
                "movs r3, #2",         // CONTROL.SPSEL = PSP, stay privileged
                "msr control, r3",
                "isb",
                "mov lr, r1",
                "orr r2, r2, #1",
                "cpsie i",
                "bx r2",
                in("r0") sp,
                options(noreturn)
            );
        }
    }
}

// Deferred switch. Saves r4-r11 and EXC_RETURN below the hardware frame on
// the outgoing PSP, asks the kernel for the next stack, restores from it.
#[cfg(not(feature = "full-fpu"))]
global_asm!(
    ".section .text.PendSV,\"ax\",%progbits",
    ".global PendSV",
    ".type PendSV,%function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    stmdb r0!, {{r4-r11, lr}}",
    "    cpsid i",
    "    bl mcu_rtos_switch_context",
    "    cpsie i",
    "    ldmia r0!, {{r4-r11, lr}}",
    "    msr psp, r0",
    "    isb",
    "    bx lr",
    ".size PendSV, . - PendSV",
);

// Same switch, plus the callee-saved FPU registers when the outgoing thread
// has an extended frame (EXC_RETURN bit 4 clear).
#[cfg(feature = "full-fpu")]
global_asm!(
    ".section .text.PendSV,\"ax\",%progbits",
    ".fpu fpv4-sp-d16",
    ".global PendSV",
    ".type PendSV,%function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    tst lr, #0x10",
    "    it eq",
    "    vstmdbeq r0!, {{s16-s31}}",
    "    stmdb r0!, {{r4-r11, lr}}",
    "    cpsid i",
    "    bl mcu_rtos_switch_context",
    "    cpsie i",
    "    ldmia r0!, {{r4-r11, lr}}",
    "    tst lr, #0x10",
    "    it eq",
    "    vldmiaeq r0!, {{s16-s31}}",
    "    msr psp, r0",
    "    isb",
    "    bx lr",
    ".size PendSV, . - PendSV",
);

#[no_mangle]
extern "C" fn mcu_rtos_switch_context(saved_sp: usize) -> usize {
    match crate::kernel::hooks() {
        Some(kernel) => kernel.switch_context(saved_sp),
        None => saved_sp,
    }
}

#[no_mangle]
#[allow(non_snake_case)]
extern "C" fn SysTick() {
    if let Some(kernel) = crate::kernel::hooks() {
        kernel.on_tick();
    }
}
