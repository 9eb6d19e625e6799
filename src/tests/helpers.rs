//! Test helper utilities and common functionality.

use crate::arch::host::HostArch;
use crate::config::TIME_1MS;
use crate::kernel::Kernel;
use crate::sched::SchedState;
use crate::thread::ThreadState;
use std::boxed::Box;
use std::vec::Vec;

/// Four slots of 512 bytes.
pub type TestKernel = Kernel<HostArch, 4, 128>;

/// Boxed so stack addresses stay put once frames are built.
pub fn new_kernel() -> Box<TestKernel> {
    Box::new(TestKernel::new())
}

/// Kernel with one thread per entry, launched with a 1 ms slice
/// (1000 us quantum at 80 MHz).
pub fn launched(entries: &[fn()]) -> Box<TestKernel> {
    let kernel = new_kernel();
    for &entry in entries {
        kernel.add_thread(entry, 0, 1).expect("slot available");
    }
    kernel.prepare_launch(TIME_1MS);
    kernel
}

/// Run the pended switch the way PendSV would.
pub fn switch(kernel: &TestKernel) -> usize {
    kernel.switch_context(kernel.running_sp())
}

/// Raw id of the running thread, 0 while idling.
pub fn running(kernel: &TestKernel) -> u32 {
    kernel.id().map_or(0, |id| id.get())
}

pub fn ready_order(kernel: &TestKernel) -> Vec<u32> {
    kernel.ready_ids().iter().map(|id| id.get()).collect()
}

pub fn task_a() {}
pub fn task_b() {}
pub fn task_c() {}
pub fn task_d() {}

/// Structural invariants of the scheduling state.
pub fn check_invariants<const N: usize>(state: &SchedState<N>) {
    let store = &state.store;
    let ready = &state.ready;

    match ready.head() {
        None => assert_eq!(ready.len(), 0),
        Some(head) => {
            // next walks the cycle in exactly len steps, prev walks it back.
            let mut cursor = head;
            for _ in 0..ready.len() {
                assert_eq!(store[cursor].state(), ThreadState::Ready);
                let next = store[cursor].next;
                assert_eq!(store[next].prev, cursor);
                cursor = next;
            }
            assert_eq!(cursor, head, "ready list is not a cycle of len members");
        }
    }

    assert_eq!(store.count(ThreadState::Ready), ready.len());
    assert_eq!(store.count(ThreadState::Sleeping), state.sleepers.len());
    assert_eq!(store.count(ThreadState::Free), store.free_len());
    for slot in state.sleepers.iter() {
        assert_eq!(store[slot].state(), ThreadState::Sleeping);
        assert!(store[slot].remaining_sleep_us() > 0);
    }

    if let Some(slot) = state.running {
        assert_ne!(store[slot].state(), ThreadState::Free);
    }
    if let Some(slot) = state.resume {
        assert_eq!(store[slot].state(), ThreadState::Ready);
    }

    let mut ids: Vec<u32> = store.iter().filter_map(|tcb| tcb.id()).map(|id| id.get()).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "duplicate thread ids");
}

/// Simple linear congruential generator for property testing.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }

    pub fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() % (max - min))
    }
}
