//! Circular doubly-linked ready list threaded through the TCB arena.
//!
//! Links are slot indices stored in the TCBs themselves, so every splice is
//! O(1) and no memory is allocated. Invariant: walking `next` from any member
//! `len` times returns to the start, and `prev` walks the same cycle backwards.

use crate::thread::{TcbStore, ThreadState};

pub struct ReadyList {
    head: Option<usize>,
    len: usize,
}

impl ReadyList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// First-created member still in the list; the entry point of the cycle.
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append after the current tail (the element before `head`).
    pub fn push_back<const N: usize>(&mut self, store: &mut TcbStore<N>, slot: usize) {
        match self.head {
            Some(head) => {
                let tail = store[head].prev;
                self.insert_after(store, tail, slot);
            }
            None => {
                let tcb = &mut store[slot];
                tcb.next = slot;
                tcb.prev = slot;
                tcb.state = ThreadState::Ready;
                self.head = Some(slot);
                self.len = 1;
            }
        }
    }

    /// Splice `slot` in directly after `anchor`, which must be a member.
    pub fn insert_after<const N: usize>(
        &mut self,
        store: &mut TcbStore<N>,
        anchor: usize,
        slot: usize,
    ) {
        debug_assert_eq!(store[anchor].state, ThreadState::Ready);
        let next = store[anchor].next;
        {
            let tcb = &mut store[slot];
            tcb.prev = anchor;
            tcb.next = next;
            tcb.state = ThreadState::Ready;
        }
        store[anchor].next = slot;
        store[next].prev = slot;
        self.len += 1;
    }

    /// Unlink `slot` by joining its neighbours. Returns the member that
    /// followed it, or `None` if the list is now empty.
    ///
    /// The unlinked TCB keeps its stale links; the caller sets its new state.
    pub fn unlink<const N: usize>(&mut self, store: &mut TcbStore<N>, slot: usize) -> Option<usize> {
        debug_assert_eq!(store[slot].state, ThreadState::Ready);
        self.len -= 1;
        if self.len == 0 {
            self.head = None;
            return None;
        }
        let (prev, next) = (store[slot].prev, store[slot].next);
        store[prev].next = next;
        store[next].prev = prev;
        if self.head == Some(slot) {
            self.head = Some(next);
        }
        Some(next)
    }

    /// Members in `next` order starting at `start`.
    pub fn iter_from<'a, const N: usize>(
        &self,
        store: &'a TcbStore<N>,
        start: usize,
    ) -> ReadyIter<'a, N> {
        ReadyIter {
            store,
            cursor: start,
            remaining: self.len,
        }
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ReadyIter<'a, const N: usize> {
    store: &'a TcbStore<N>,
    cursor: usize,
    remaining: usize,
}

impl<const N: usize> Iterator for ReadyIter<'_, N> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let slot = self.cursor;
        self.cursor = self.store[slot].next;
        Some(slot)
    }
}
