//! Bounded FIFO for streaming samples from an interrupt producer to a
//! thread consumer.
//!
//! The producer owns `put_index`, the consumer owns `get_index`, and `count`
//! is the only field both sides modify (atomic add/sub). `put` never masks
//! interrupts, so it is usable from any handler.

use crate::config::FIFO_CAPACITY;
use crate::errors::FifoError;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use portable_atomic::{AtomicUsize, Ordering};

/// Single-producer, single-consumer ring buffer.
///
/// `CAP` is the backing storage; [`Fifo::init`] chooses how much of it is used.
pub struct Fifo<T: Copy, const CAP: usize = FIFO_CAPACITY> {
    buffer: UnsafeCell<[MaybeUninit<T>; CAP]>,
    size: AtomicUsize,
    put_index: AtomicUsize,
    get_index: AtomicUsize,
    count: AtomicUsize,
}

// Safety: slots are handed between exactly one producer and one consumer,
// and ownership of a slot transfers through the Release/Acquire on `count`.
unsafe impl<T: Copy + Send, const CAP: usize> Sync for Fifo<T, CAP> {}

impl<T: Copy, const CAP: usize> Fifo<T, CAP> {
    /// Create an empty FIFO using the whole backing capacity.
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([MaybeUninit::uninit(); CAP]),
            size: AtomicUsize::new(CAP),
            put_index: AtomicUsize::new(0),
            get_index: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        }
    }

    /// Empty the FIFO and limit it to `size` elements.
    ///
    /// Must run before any producer or consumer touches the FIFO.
    pub fn init(&self, size: usize) -> Result<(), FifoError> {
        if size == 0 || size > CAP {
            log::warn!("fifo: rejected size {} (backing capacity {})", size, CAP);
            return Err(FifoError::InvalidSize(size));
        }
        self.size.store(size, Ordering::Relaxed);
        self.put_index.store(0, Ordering::Relaxed);
        self.get_index.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Release);
        Ok(())
    }

    /// Enter one sample. Never blocks; on a full buffer the sample is dropped.
    pub fn put(&self, data: T) -> Result<(), FifoError> {
        let size = self.size.load(Ordering::Relaxed);
        if self.count.load(Ordering::Acquire) >= size {
            return Err(FifoError::Full);
        }
        let put = self.put_index.load(Ordering::Relaxed);
        // Safety: `put` is in 0..size and the slot is not visible to the
        // consumer until `count` is bumped below.
        unsafe { self.slot(put).write(MaybeUninit::new(data)) };
        self.put_index.store((put + 1) % size, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Remove the oldest sample, spinning while the FIFO is empty.
    ///
    /// Thread context only.
    pub fn get(&self) -> T {
        loop {
            if let Some(data) = self.try_get() {
                return data;
            }
            core::hint::spin_loop();
        }
    }

    /// Remove the oldest sample if there is one.
    pub fn try_get(&self) -> Option<T> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        let size = self.size.load(Ordering::Relaxed);
        let get = self.get_index.load(Ordering::Relaxed);
        // Safety: count > 0 means the producer published this slot.
        let data = unsafe { self.slot(get).read().assume_init() };
        self.get_index.store((get + 1) % size, Ordering::Relaxed);
        self.count.fetch_sub(1, Ordering::Release);
        Some(data)
    }

    /// Number of samples currently stored. Zero means `get` would spin.
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        debug_assert!(index < CAP);
        // Raw element pointer; never forms a reference to the whole array.
        unsafe { self.buffer.get().cast::<MaybeUninit<T>>().add(index) }
    }
}

impl<T: Copy, const CAP: usize> Default for Fifo<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}
