//! Architecture abstraction layer for context switching and interrupt handling.
//!
//! The kernel never touches CPU registers directly. Everything machine
//! specific (interrupt masking, pending the deferred switch exception, the
//! tick source, entering the first thread) sits behind [`Arch`].

pub mod frame;

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations involve direct hardware manipulation. The switch exception
/// raised by [`Arch::request_context_switch`] must run at a lower priority
/// than the tick interrupt, and it must call
/// [`Kernel::switch_context`](crate::Kernel::switch_context) with interrupts
/// masked.
pub trait Arch {
    /// Enable interrupts on the current CPU.
    fn enable_interrupts();

    /// Disable interrupts on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Pend the low-priority context switch exception.
    ///
    /// The switch happens once no higher-priority handler is active; this
    /// never switches synchronously.
    fn request_context_switch();

    /// Program the periodic tick source with `reload` bus cycles and start it.
    fn start_tick(reload: u32);

    /// Current value of the tick down-counter.
    fn tick_value() -> u32;

    /// Idle until the next interrupt.
    fn wait_for_interrupt();

    /// Enter the first thread. `sp` points at a frame built by
    /// [`frame::init_frame`].
    ///
    /// # Safety
    ///
    /// `sp` must point into a stack region that stays valid for the lifetime
    /// of the thread. Called once, from the launch path.
    unsafe fn start_first_thread(sp: usize) -> !;
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

#[cfg(any(test, feature = "std-shim", not(all(target_arch = "arm", target_os = "none"))))]
pub mod host;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::cortex_m::CortexM4 as DefaultArch;

/// Any hosted target runs on the shim.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use self::host::HostArch as DefaultArch;
