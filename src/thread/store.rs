//! Fixed-capacity TCB arena with a free list.

use super::{Tcb, ThreadState};
use core::ops::{Index, IndexMut};

/// `N` TCB slots. Slots are handed out lowest-index first on a fresh store,
/// and a released slot is the next one reused.
pub struct TcbStore<const N: usize> {
    tcbs: [Tcb; N],
    free_head: Option<usize>,
    free_len: usize,
}

impl<const N: usize> TcbStore<N> {
    pub const fn new() -> Self {
        let mut tcbs = [Tcb::EMPTY; N];
        let mut i = 0;
        while i < N {
            tcbs[i].next = i + 1;
            i += 1;
        }
        Self {
            tcbs,
            free_head: if N > 0 { Some(0) } else { None },
            free_len: N,
        }
    }

    /// Take a free slot. The TCB is reset and left in the `Free` state for
    /// the caller to fill in.
    pub fn allocate(&mut self) -> Option<usize> {
        let slot = self.free_head?;
        self.free_len -= 1;
        self.free_head = if self.free_len == 0 {
            None
        } else {
            Some(self.tcbs[slot].next)
        };
        self.tcbs[slot] = Tcb::EMPTY;
        Some(slot)
    }

    /// Return a slot to the free list.
    pub fn release(&mut self, slot: usize) {
        let mut tcb = Tcb::EMPTY;
        tcb.next = self.free_head.unwrap_or(N);
        self.tcbs[slot] = tcb;
        self.free_head = Some(slot);
        self.free_len += 1;
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn free_len(&self) -> usize {
        self.free_len
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tcb> {
        self.tcbs.iter()
    }

    /// Number of slots in `state`.
    pub fn count(&self, state: ThreadState) -> usize {
        self.tcbs.iter().filter(|tcb| tcb.state == state).count()
    }
}

impl<const N: usize> Default for TcbStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Index<usize> for TcbStore<N> {
    type Output = Tcb;

    fn index(&self, slot: usize) -> &Tcb {
        &self.tcbs[slot]
    }
}

impl<const N: usize> IndexMut<usize> for TcbStore<N> {
    fn index_mut(&mut self, slot: usize) -> &mut Tcb {
        &mut self.tcbs[slot]
    }
}
