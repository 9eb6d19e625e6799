//! Thread control blocks.

pub mod store;

pub use store::TcbStore;

/// Unique identifier for threads.
///
/// IDs are assigned at creation, start at 1 and are never reused, even when
/// the slot that held a killed thread is handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(core::num::NonZeroU32);

impl ThreadId {
    pub(crate) fn new(id: u32) -> Option<Self> {
        core::num::NonZeroU32::new(id).map(Self)
    }

    /// Get the raw ID value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a TCB currently lives. The states are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Slot unallocated, linked into the free list
    Free = 0,
    /// Linked into the circular ready list
    Ready = 1,
    /// In the sleep set with a non-zero remaining delay
    Sleeping = 2,
    /// Killed; the stack is still live until the next context switch
    Dead = 3,
}

/// Per-thread record.
///
/// `next`/`prev` are slot indices into the owning [`TcbStore`]. While the
/// thread is Ready they form the ready cycle; while Free, `next` chains the
/// free list. In any other state they are stale.
#[derive(Debug, Clone, Copy)]
pub struct Tcb {
    /// Saved stack pointer; valid while the thread is not running.
    pub(crate) sp: usize,
    pub(crate) next: usize,
    pub(crate) prev: usize,
    pub(crate) id: Option<ThreadId>,
    /// Remaining sleep in microseconds; zero means not sleeping.
    pub(crate) sleep_us: u64,
    pub(crate) priority: u8,
    pub(crate) state: ThreadState,
}

impl Tcb {
    pub(crate) const EMPTY: Tcb = Tcb {
        sp: 0,
        next: 0,
        prev: 0,
        id: None,
        sleep_us: 0,
        priority: 0,
        state: ThreadState::Free,
    };

    pub fn id(&self) -> Option<ThreadId> {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Advisory priority; the scheduler is round-robin and ignores it.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn remaining_sleep_us(&self) -> u64 {
        self.sleep_us
    }
}
