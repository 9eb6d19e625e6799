//! Threads temporarily out of the ready list, each counting down a delay.

use crate::thread::{TcbStore, ThreadState};
use heapless::Vec;

/// Sleeping slots in the order they went to sleep.
pub struct SleepSet<const N: usize> {
    slots: Vec<usize, N>,
}

impl<const N: usize> SleepSet<N> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Record `slot` with `delay_us` remaining. The caller has already
    /// unlinked it from the ready list.
    pub fn insert(&mut self, store: &mut TcbStore<N>, slot: usize, delay_us: u64) {
        let tcb = &mut store[slot];
        tcb.sleep_us = delay_us;
        tcb.state = ThreadState::Sleeping;
        // At most N slots exist, so the set can never overflow.
        let pushed = self.slots.push(slot);
        debug_assert!(pushed.is_ok());
    }

    /// Age every sleeper by `quantum_us`. Sleepers that reach zero are
    /// removed, keeping the survivors' order, and returned in scan order.
    pub fn age(&mut self, store: &mut TcbStore<N>, quantum_us: u32) -> Vec<usize, N> {
        let mut woken = Vec::new();
        self.slots.retain(|&slot| {
            let tcb = &mut store[slot];
            tcb.sleep_us = tcb.sleep_us.saturating_sub(u64::from(quantum_us));
            if tcb.sleep_us == 0 {
                let _ = woken.push(slot);
                false
            } else {
                true
            }
        });
        woken
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.slots.contains(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().copied()
    }
}

impl<const N: usize> Default for SleepSet<N> {
    fn default() -> Self {
        Self::new()
    }
}
