//! Counting and binary semaphores.
//!
//! Waiters are not parked. A blocked `wait` spins with interrupts masked,
//! opening the mask for one instruction window per poll so other interrupt
//! sources (including the tick that rotates threads) can run. The spinning
//! thread stays Ready and burns its time slice until the tick switches it out.
//! The value is only decremented inside the masked window right after the
//! `value > 0` check, so no waiter ever observes it below zero.

use super::critical::CriticalSection;
use crate::arch::Arch;
use core::marker::PhantomData;
use portable_atomic::{AtomicI32, Ordering};

pub struct Semaphore<A: Arch> {
    value: AtomicI32,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch> Semaphore<A> {
    pub const fn new(value: i32) -> Self {
        Self {
            value: AtomicI32::new(value),
            _arch: PhantomData,
        }
    }

    /// Reset the count.
    pub fn init(&self, value: i32) {
        let _cs = CriticalSection::<A>::enter();
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current count. Informational only; may change right after the read.
    pub fn value(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Decrement, spinning while the count is not positive.
    ///
    /// Must not be called from an interrupt handler.
    pub fn wait(&self) {
        let _cs = CriticalSection::<A>::enter();
        self.spin_until_available();
        let v = self.value.load(Ordering::Relaxed);
        self.value.store(v - 1, Ordering::Relaxed);
    }

    /// Increment. Safe from interrupt handlers.
    pub fn signal(&self) {
        let _cs = CriticalSection::<A>::enter();
        let v = self.value.load(Ordering::Relaxed);
        self.value.store(v + 1, Ordering::Relaxed);
    }

    /// Binary wait: spin until the flag is 1, then clear it.
    pub fn wait_binary(&self) {
        let _cs = CriticalSection::<A>::enter();
        self.spin_until_available();
        self.value.store(0, Ordering::Relaxed);
    }

    /// Binary signal: set the flag to 1. Safe from interrupt handlers.
    pub fn signal_binary(&self) {
        let _cs = CriticalSection::<A>::enter();
        self.value.store(1, Ordering::Relaxed);
    }

    /// Non-blocking decrement. Returns `false` if the count was not positive.
    pub fn try_wait(&self) -> bool {
        let _cs = CriticalSection::<A>::enter();
        let v = self.value.load(Ordering::Relaxed);
        if v > 0 {
            self.value.store(v - 1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    // Called with interrupts masked; returns with them masked.
    fn spin_until_available(&self) {
        while self.value.load(Ordering::Relaxed) <= 0 {
            A::enable_interrupts();
            core::hint::spin_loop();
            A::disable_interrupts();
        }
    }
}
