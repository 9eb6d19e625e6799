//! One-slot rendezvous between two threads.
//!
//! `send` blocks while unread mail is present and `recv` blocks while the box
//! is empty. Two binary semaphores carry the Empty/Full state: `box_free` is 1
//! while the slot may be written, `data_valid` is 1 while it holds unread mail.

use super::critical::CriticalSection;
use super::semaphore::Semaphore;
use crate::arch::Arch;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

pub struct Mailbox<A: Arch, T: Copy> {
    slot: UnsafeCell<MaybeUninit<T>>,
    box_free: Semaphore<A>,
    data_valid: Semaphore<A>,
}

// Safety: the slot is written only by the holder of `box_free` and read only
// by the holder of `data_valid`; the two are never held at once.
unsafe impl<A: Arch, T: Copy + Send> Sync for Mailbox<A, T> {}

impl<A: Arch, T: Copy> Mailbox<A, T> {
    pub const fn new() -> Self {
        Self {
            slot: UnsafeCell::new(MaybeUninit::uninit()),
            box_free: Semaphore::new(1),
            data_valid: Semaphore::new(0),
        }
    }

    /// Clear the slot and mark the box Empty.
    pub fn init(&self) {
        let _cs = CriticalSection::<A>::enter();
        // Safety: masked, and no sender or receiver may be active during init.
        unsafe { *self.slot.get() = MaybeUninit::uninit() };
        self.box_free.init(1);
        self.data_valid.init(0);
    }

    /// Deliver `data`, spinning while the previous mail is unread.
    pub fn send(&self, data: T) {
        self.box_free.wait_binary();
        // Safety: holding `box_free`.
        unsafe { (*self.slot.get()).write(data) };
        self.data_valid.signal_binary();
    }

    /// Take the mail, spinning while the box is empty.
    pub fn recv(&self) -> T {
        self.data_valid.wait_binary();
        // Safety: `data_valid` is only signalled after the slot is written.
        let data = unsafe { (*self.slot.get()).assume_init_read() };
        self.box_free.signal_binary();
        data
    }

    /// Deliver `data` if the box is Empty; hands it back otherwise.
    pub fn try_send(&self, data: T) -> Result<(), T> {
        if !self.box_free.try_wait() {
            return Err(data);
        }
        unsafe { (*self.slot.get()).write(data) };
        self.data_valid.signal_binary();
        Ok(())
    }

    /// Take the mail if the box is Full.
    pub fn try_recv(&self) -> Option<T> {
        if !self.data_valid.try_wait() {
            return None;
        }
        let data = unsafe { (*self.slot.get()).assume_init_read() };
        self.box_free.signal_binary();
        Some(data)
    }

    /// `true` while unread mail is present.
    pub fn is_full(&self) -> bool {
        self.data_valid.value() > 0
    }
}

impl<A: Arch, T: Copy> Default for Mailbox<A, T> {
    fn default() -> Self {
        Self::new()
    }
}
