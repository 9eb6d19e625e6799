//! Round-robin scheduling state: the TCB arena, the ready cycle, the sleep
//! set, and the running-thread pointer.
//!
//! Nothing here masks interrupts or talks to hardware. [`Kernel`](crate::Kernel)
//! wraps every call in a critical section and turns the results into
//! switch requests.

pub mod ready_list;
pub mod sleep_set;

pub use ready_list::ReadyList;
pub use sleep_set::SleepSet;

use crate::thread::{TcbStore, ThreadId, ThreadState};
use heapless::Vec;

/// Snapshot of slot usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub capacity: usize,
    pub free: usize,
    pub ready: usize,
    pub sleeping: usize,
    /// Killed threads whose slot is reclaimed at the next switch
    pub dead: usize,
}

/// Whole-system scheduling state for `N` thread slots.
pub struct SchedState<const N: usize> {
    pub(crate) store: TcbStore<N>,
    pub(crate) ready: ReadyList,
    pub(crate) sleepers: SleepSet<N>,
    /// Slot whose context is on the CPU; `None` before launch and while idling.
    pub(crate) running: Option<usize>,
    /// Who the next switch picks instead of rotating. Set when `running`
    /// leaves the list (slept or died, switch still pending) and when a tick
    /// wakes threads after that or while idling.
    pub(crate) resume: Option<usize>,
    pub(crate) idle_sp: usize,
    pub(crate) quantum_us: u32,
    pub(crate) clock: MsClock,
    last_id: u32,
}

/// Millisecond clock advanced by the tick handler.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MsClock {
    pub(crate) ms: u32,
    pub(crate) sub_us: u32,
}

impl MsClock {
    fn advance(&mut self, us: u32) {
        let total = self.sub_us + us;
        self.ms = self.ms.wrapping_add(total / 1000);
        self.sub_us = total % 1000;
    }
}

impl<const N: usize> SchedState<N> {
    pub const fn new() -> Self {
        Self {
            store: TcbStore::new(),
            ready: ReadyList::new(),
            sleepers: SleepSet::new(),
            running: None,
            resume: None,
            idle_sp: 0,
            quantum_us: 0,
            clock: MsClock { ms: 0, sub_us: 0 },
            last_id: 0,
        }
    }

    fn running_is_ready(&self) -> Option<usize> {
        self.running
            .filter(|&slot| self.store[slot].state == ThreadState::Ready)
    }

    fn next_id(&mut self) -> ThreadId {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if let Some(id) = ThreadId::new(self.last_id) {
                return id;
            }
        }
    }

    /// Give an allocated slot its ID and link it after the ready tail. The
    /// caller has already written the initial frame at `sp`.
    pub fn admit(&mut self, slot: usize, sp: usize, priority: u8) -> ThreadId {
        let id = self.next_id();
        {
            let tcb = &mut self.store[slot];
            tcb.id = Some(id);
            tcb.sp = sp;
            tcb.priority = priority;
        }
        self.ready.push_back(&mut self.store, slot);
        id
    }

    /// Take the running thread out of the ready cycle, remembering who
    /// follows it so the pended switch still has a target.
    fn unlink_running(&mut self, slot: usize) {
        let next = self.ready.unlink(&mut self.store, slot);
        self.resume = next;
    }

    /// Move the running thread to the sleep set for `delay_us`.
    /// Returns `false` if there is no running thread.
    pub fn sleep_running(&mut self, delay_us: u64) -> bool {
        let Some(slot) = self.running_is_ready() else {
            return false;
        };
        self.unlink_running(slot);
        self.sleepers.insert(&mut self.store, slot, delay_us);
        true
    }

    /// Mark the running thread Dead. Its slot is reclaimed by the next
    /// [`switch`](Self::switch), once its stack is no longer in use.
    pub fn retire_running(&mut self) -> Option<ThreadId> {
        let slot = self.running_is_ready()?;
        self.unlink_running(slot);
        let tcb = &mut self.store[slot];
        tcb.state = ThreadState::Dead;
        tcb.id
    }

    /// Age the sleep set by one quantum and relink every thread whose delay
    /// ran out. Returns how many woke.
    ///
    /// Woken threads go directly after the running thread, in scan order, so
    /// they run next. If the running thread has already left the list they go
    /// in front of the thread it would have switched to.
    pub fn tick(&mut self) -> usize {
        let quantum = self.quantum_us;
        self.clock.advance(quantum);
        let woken = self.sleepers.age(&mut self.store, quantum);
        let Some((&first, _)) = woken.split_first() else {
            return 0;
        };

        let mut anchor = match self.running_is_ready() {
            Some(running) => Some(running),
            None => {
                let anchor = self.resume.map(|next| self.store[next].prev);
                self.resume = Some(first);
                anchor
            }
        };
        for &slot in woken.iter() {
            match anchor {
                Some(a) => self.ready.insert_after(&mut self.store, a, slot),
                None => self.ready.push_back(&mut self.store, slot),
            }
            anchor = Some(slot);
        }
        woken.len()
    }

    /// Context switch decision. Stores `saved_sp` for the outgoing context
    /// and returns the stack pointer to restore.
    pub fn switch(&mut self, saved_sp: usize) -> usize {
        match self.running {
            Some(slot) => match self.store[slot].state {
                ThreadState::Dead => self.store.release(slot),
                _ => self.store[slot].sp = saved_sp,
            },
            None => self.idle_sp = saved_sp,
        }

        // A pending resume wins over rotation.
        let next = self
            .resume
            .or_else(|| self.running_is_ready().map(|slot| self.store[slot].next))
            .or(self.ready.head());
        self.running = next;
        self.resume = None;
        match next {
            Some(slot) => self.store[slot].sp,
            None => self.idle_sp,
        }
    }

    /// Pick the first thread for launch. Returns its stack pointer, or the
    /// idle context's if nothing was registered.
    pub fn start(&mut self, quantum_us: u32) -> usize {
        self.quantum_us = quantum_us;
        self.running = self.ready.head();
        self.resume = None;
        match self.running {
            Some(slot) => self.store[slot].sp,
            None => self.idle_sp,
        }
    }

    pub fn running_id(&self) -> Option<ThreadId> {
        self.running.and_then(|slot| self.store[slot].id)
    }

    /// Ready thread IDs in the order they will run, starting with the
    /// running thread (or whoever runs next if it has left the list).
    pub fn ready_ids(&self) -> Vec<ThreadId, N> {
        let start = self
            .running_is_ready()
            .or(self.resume)
            .or(self.ready.head());
        let mut ids = Vec::new();
        if let Some(start) = start {
            for slot in self.ready.iter_from(&self.store, start) {
                if let Some(id) = self.store[slot].id {
                    let _ = ids.push(id);
                }
            }
        }
        ids
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            capacity: N,
            free: self.store.free_len(),
            ready: self.ready.len(),
            sleeping: self.sleepers.len(),
            dead: self.store.count(ThreadState::Dead),
        }
    }
}

impl<const N: usize> Default for SchedState<N> {
    fn default() -> Self {
        Self::new()
    }
}
