//! Scoped interrupt masking.

use crate::arch::Arch;
use core::marker::PhantomData;

/// Masks interrupts for its lifetime and restores the previous mask state
/// on drop, including early returns.
///
/// Nested sections are fine: an inner guard that found interrupts already
/// masked leaves them masked when it drops.
#[must_use = "interrupts are unmasked again as soon as the guard is dropped"]
pub struct CriticalSection<A: Arch> {
    was_enabled: bool,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch> CriticalSection<A> {
    /// Mask interrupts.
    #[inline]
    pub fn enter() -> Self {
        let was_enabled = A::interrupts_enabled();
        A::disable_interrupts();
        Self {
            was_enabled,
            _arch: PhantomData,
        }
    }

    /// Whether interrupts were enabled when the section was entered.
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<A: Arch> Drop for CriticalSection<A> {
    #[inline]
    fn drop(&mut self) {
        if self.was_enabled {
            A::enable_interrupts();
        }
    }
}
