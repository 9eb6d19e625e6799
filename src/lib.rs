#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Small preemptive round-robin kernel for single-core Cortex-M4
//! microcontrollers (TM4C123 class, 80 MHz bus clock).
//!
//! A fixed pool of foreground threads shares the CPU in a circular ready
//! list, rotated by the SysTick interrupt. Threads can sleep, yield, and
//! kill themselves; they coordinate through spinning semaphores, an
//! ISR-to-thread FIFO, and a one-slot mailbox. Periodic tasks bound to
//! hardware timers, and button tasks bound to the two push buttons, run
//! straight from their interrupt handlers, outside the ready list.
//!
//! # Features
//!
//! - `full-fpu`: save and restore the FPU callee-saved registers on switch
//! - `std-shim`: build the host shim architecture even on Cortex-M targets
//!   (hosted targets always use it)
//! - `panic-handler`: mask interrupts and halt on panic (default)
//!
//! # Quick Start
//!
//! ```ignore
//! use mcu_rtos::{config::TIME_2MS, DefaultKernel, Semaphore, DefaultArch};
//!
//! static KERNEL: DefaultKernel = DefaultKernel::new();
//! static LED: Semaphore<DefaultArch> = Semaphore::new(1);
//!
//! fn blink() {
//!     loop {
//!         LED.wait();
//!         // toggle
//!         LED.signal();
//!         KERNEL.sleep(500);
//!     }
//! }
//!
//! fn main() -> ! {
//!     KERNEL.init();
//!     KERNEL.add_thread(blink, 0, 1).ok();
//!     KERNEL.launch(TIME_2MS)
//! }
//! ```

pub mod arch;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod periodic;
pub mod sched;
pub mod switches;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "std-shim", not(all(target_arch = "arm", target_os = "none"))))]
extern crate std;

#[cfg(all(
    target_arch = "arm",
    target_os = "none",
    not(test),
    feature = "panic-handler"
))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}

// ============================================================================
// Public API
// ============================================================================

pub use arch::{Arch, DefaultArch};

pub use kernel::{hooks, Kernel, KernelHooks};

pub use sched::SchedulerStats;

pub use thread::{ThreadId, ThreadState};

pub use sync::{CriticalSection, Fifo, Mailbox, Semaphore};

pub use periodic::{PeriodicTask, PeriodicTasks, TimerDriver};

pub use switches::{Switch, SwitchDriver, SwitchTask, SwitchTasks};

pub use time::time_difference;

pub use errors::{FifoError, KernelError, KernelResult, SpawnError, SwitchError, TimerError};

/// Kernel with the default capacities on the default architecture.
pub type DefaultKernel = Kernel<DefaultArch>;

/// Give up the rest of the time slice on the launched kernel.
///
/// Does nothing before [`Kernel::launch`].
#[inline]
pub fn yield_now() {
    if let Some(kernel) = hooks() {
        kernel.suspend();
    }
}
