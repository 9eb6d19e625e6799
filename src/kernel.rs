//! Kernel object tying the scheduling state to the platform layer.
//!
//! One [`Kernel`] exists per program, normally in a `static`. Threads and
//! primitives are registered during initialization with interrupts masked,
//! then [`Kernel::launch`] hands the CPU to the first thread and never
//! returns. There is no shutdown.

use crate::arch::frame;
use crate::arch::Arch;
use crate::config::{BUS_CLOCK_HZ, IDLE_STACK_WORDS, MAX_THREADS, STACK_WORDS};
use crate::errors::SpawnError;
use crate::sched::{SchedState, SchedulerStats};
use crate::sync::CriticalSection;
use crate::thread::{ThreadId, ThreadState};
use crate::time;
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use portable_atomic::{AtomicBool, Ordering};

/// Entry points the interrupt handlers use to reach the launched kernel.
pub trait KernelHooks: Sync {
    /// Tick interrupt body.
    fn on_tick(&self);
    /// Deferred switch body; see [`Kernel::switch_context`].
    fn switch_context(&self, saved_sp: usize) -> usize;
    /// Pend a switch without leaving the ready list.
    fn suspend(&self);
    /// Kill the running thread.
    fn exit_current(&self) -> !;
}

/// Global kernel reference for interrupt handlers, set by `launch`.
static HOOKS: spin::Once<&'static dyn KernelHooks> = spin::Once::new();

/// The launched kernel, if any.
pub fn hooks() -> Option<&'static dyn KernelHooks> {
    HOOKS.get().copied()
}

#[repr(C, align(8))]
struct Stacks<const N: usize, const S: usize>(UnsafeCell<[[u32; S]; N]>);

#[repr(C, align(8))]
struct IdleStack(UnsafeCell<[u32; IDLE_STACK_WORDS]>);

/// Round-robin kernel with `N` thread slots of `S` stack words each.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `N` - Thread capacity
/// * `S` - Stack words per thread
pub struct Kernel<A: Arch, const N: usize = MAX_THREADS, const S: usize = STACK_WORDS> {
    /// Only locked inside a critical section, so an interrupt handler can
    /// never find it held.
    state: spin::Mutex<SchedState<N>>,
    stacks: Stacks<N, S>,
    idle_stack: IdleStack,
    clock_hz: u32,
    launched: AtomicBool,
    _arch: PhantomData<fn() -> A>,
}

// Safety: stack regions are written only while their slot is Free (under the
// critical section) or by the CPU while the owning thread runs.
unsafe impl<A: Arch, const N: usize, const S: usize> Send for Kernel<A, N, S> {}
unsafe impl<A: Arch, const N: usize, const S: usize> Sync for Kernel<A, N, S> {}

impl<A: Arch, const N: usize, const S: usize> Kernel<A, N, S> {
    /// Kernel for the default 80 MHz bus clock.
    pub const fn new() -> Self {
        Self::with_clock(BUS_CLOCK_HZ)
    }

    /// Kernel whose tick source counts `clock_hz`.
    pub const fn with_clock(clock_hz: u32) -> Self {
        Self {
            state: spin::Mutex::new(SchedState::new()),
            stacks: Stacks(UnsafeCell::new([[0; S]; N])),
            idle_stack: IdleStack(UnsafeCell::new([0; IDLE_STACK_WORDS])),
            clock_hz,
            launched: AtomicBool::new(false),
            _arch: PhantomData,
        }
    }

    /// Mask interrupts until launch.
    pub fn init(&self) {
        A::disable_interrupts();
        log::debug!("kernel: init, {} slots of {} bytes", N, S * 4);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SchedState<N>) -> R) -> R {
        let _cs = CriticalSection::<A>::enter();
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// # Safety
    ///
    /// `slot` must be allocated to the caller and not running.
    #[allow(clippy::mut_from_ref)]
    unsafe fn stack_region(&self, slot: usize) -> &mut [u32] {
        let rows = self.stacks.0.get().cast::<[u32; S]>();
        unsafe { &mut *rows.add(slot) }
    }

    /// Register a foreground thread.
    ///
    /// `stack_size` is in bytes, a multiple of 8 and at most the slot's region;
    /// `0` takes the whole region. `priority` is recorded but scheduling is
    /// round-robin. The thread is linked after the current ready tail.
    ///
    /// Fails with [`SpawnError::TooManyThreads`] once every slot is taken;
    /// the ready list is left unchanged.
    pub fn add_thread(&self, entry: fn(), stack_size: usize, priority: u8) -> Result<ThreadId, SpawnError> {
        let min_bytes = (frame::FRAME_WORDS + 1) * 4;
        if stack_size % 8 != 0 || stack_size > S * 4 || (stack_size != 0 && stack_size < min_bytes) {
            log::warn!("kernel: rejected stack size {} (region {} bytes)", stack_size, S * 4);
            return Err(SpawnError::InvalidStackSize(stack_size));
        }
        let words = if stack_size == 0 { S } else { stack_size / 4 };

        let _cs = CriticalSection::<A>::enter();
        let mut state = self.state.lock();
        let Some(slot) = state.store.allocate() else {
            log::warn!("kernel: thread table full ({} slots)", N);
            return Err(SpawnError::TooManyThreads);
        };

        // Safety: the slot was just taken off the free list.
        let region = unsafe { self.stack_region(slot) };
        let usable = &mut region[S - words..];
        let Some(sp) = frame::init_frame(usable, entry as usize, thread_exit as usize) else {
            state.store.release(slot);
            return Err(SpawnError::InvalidStackSize(stack_size));
        };

        let id = state.admit(slot, sp, priority);
        log::debug!("kernel: thread {} added in slot {} (priority {})", id, slot, priority);
        Ok(id)
    }

    /// Give up the rest of the time slice. The caller stays in the ready
    /// list and resumes when the round comes back to it.
    pub fn suspend(&self) {
        A::request_context_switch();
    }

    /// Leave the ready list for at least `ms` milliseconds.
    ///
    /// The delay is aged by the tick, so the actual absence is rounded up to
    /// whole time slices. `sleep(0)` is [`suspend`](Self::suspend).
    pub fn sleep(&self, ms: u32) {
        if ms == 0 {
            self.suspend();
            return;
        }
        if self.with_state(|state| state.sleep_running(time::ms_to_us(ms))) {
            A::request_context_switch();
        } else {
            log::warn!("kernel: sleep({}) with no running thread", ms);
        }
    }

    /// Kill the calling thread. Its slot is reused once the switch away
    /// from it has happened.
    pub fn kill(&self) -> ! {
        self.retire_current();
        loop {
            A::wait_for_interrupt();
        }
    }

    /// Unlink the running thread and pend the switch that buries it.
    pub(crate) fn retire_current(&self) -> Option<ThreadId> {
        let retired = self.with_state(|state| state.retire_running());
        match retired {
            Some(id) => {
                log::debug!("kernel: thread {} killed", id);
                A::request_context_switch();
            }
            None => log::warn!("kernel: kill with no running thread"),
        }
        retired
    }

    /// ID of the running thread; `None` before launch and while idling.
    pub fn id(&self) -> Option<ThreadId> {
        self.with_state(|state| state.running_id())
    }

    /// Tick interrupt body: age sleepers, wake expired ones, and always pend
    /// a switch so the quantum doubles as the round-robin slice.
    pub fn tick(&self) {
        let woken = self.with_state(|state| state.tick());
        if woken > 0 {
            log::trace!("kernel: tick woke {} thread(s)", woken);
        }
        A::request_context_switch();
    }

    /// Context switch decision, called by the deferred switch handler with
    /// interrupts masked. Records `saved_sp` for the outgoing context and
    /// returns the stack pointer of the next one: the running thread's
    /// successor in the ready cycle, or the idle context when nothing is ready.
    pub fn switch_context(&self, saved_sp: usize) -> usize {
        self.with_state(|state| state.switch(saved_sp))
    }

    /// Live value of the tick down-counter, in bus cycles. Wraps every
    /// time slice; see [`time::time_difference`].
    pub fn time(&self) -> u32 {
        A::tick_value()
    }

    /// Milliseconds of ticks since launch or the last [`clear_ms_time`](Self::clear_ms_time).
    pub fn ms_time(&self) -> u32 {
        self.with_state(|state| state.clock.ms)
    }

    pub fn clear_ms_time(&self) {
        self.with_state(|state| {
            state.clock.ms = 0;
            state.clock.sub_us = 0;
        });
    }

    /// Start scheduling with a `time_slice` of bus cycles and never return.
    ///
    /// The slice is clamped to the 24-bit tick counter. Must be the last call
    /// made by initialization code.
    pub fn launch(&'static self, time_slice: u32) -> !
    where
        A: 'static,
    {
        HOOKS.call_once(|| self as &'static dyn KernelHooks);
        let (reload, sp) = self.prepare_launch(time_slice);
        A::start_tick(reload);
        // Safety: `sp` is the saved frame of the first thread (or idle),
        // inside a stack region owned by this kernel for the program's life.
        unsafe { A::start_first_thread(sp) }
    }

    /// Everything `launch` does short of arming the tick and jumping.
    /// Returns the tick reload and the first context's stack pointer.
    pub(crate) fn prepare_launch(&self, time_slice: u32) -> (u32, usize) {
        let reload = time::clamp_time_slice(time_slice);
        if reload != time_slice {
            log::warn!("kernel: time slice {} clamped to {}", time_slice, reload);
        }
        let quantum = time::quantum_us(reload, self.clock_hz);

        // Safety: the idle stack is only touched here, before launch.
        let idle = unsafe { &mut *self.idle_stack.0.get() };
        let idle_sp = frame::init_frame(idle, idle_loop::<A> as usize, idle_loop::<A> as usize)
            .unwrap_or_default();

        let (sp, ready) = self.with_state(|state| {
            state.idle_sp = idle_sp;
            (state.start(quantum), state.ready.len())
        });
        self.launched.store(true, Ordering::Release);
        log::info!("kernel: launch, quantum {} us, {} thread(s) ready", quantum, ready);
        (reload, sp)
    }

    pub fn is_launched(&self) -> bool {
        self.launched.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.with_state(|state| state.stats())
    }

    /// Ready thread IDs in run order, starting from the running thread.
    pub fn ready_ids(&self) -> heapless::Vec<ThreadId, N> {
        self.with_state(|state| state.ready_ids())
    }

    /// Current state of the thread with `id`, or `None` once its slot has
    /// been reclaimed.
    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.with_state(|state| {
            state
                .store
                .iter()
                .find(|tcb| tcb.id() == Some(id))
                .map(|tcb| tcb.state())
        })
    }

    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&SchedState<N>) -> R) -> R {
        self.with_state(|state| f(state))
    }

    /// Saved stack pointer of the running context, as the switch handler
    /// would pass it.
    #[cfg(test)]
    pub(crate) fn running_sp(&self) -> usize {
        self.with_state(|state| match state.running {
            Some(slot) => state.store[slot].sp,
            None => state.idle_sp,
        })
    }

    #[cfg(test)]
    pub(crate) fn stack_of(&self, slot: usize) -> &[u32] {
        unsafe { &*self.stacks.0.get().cast::<[u32; S]>().add(slot) }
    }
}

impl<A: Arch, const N: usize, const S: usize> Default for Kernel<A, N, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch + 'static, const N: usize, const S: usize> KernelHooks for Kernel<A, N, S> {
    fn on_tick(&self) {
        self.tick();
    }

    fn switch_context(&self, saved_sp: usize) -> usize {
        Kernel::switch_context(self, saved_sp)
    }

    fn suspend(&self) {
        Kernel::suspend(self);
    }

    fn exit_current(&self) -> ! {
        self.kill()
    }
}

/// Return address planted in every initial frame: a thread whose entry
/// function returns kills itself.
extern "C" fn thread_exit() -> ! {
    match hooks() {
        Some(kernel) => kernel.exit_current(),
        None => loop {
            core::hint::spin_loop();
        },
    }
}

/// Runs whenever the ready list is empty.
extern "C" fn idle_loop<A: Arch>() -> ! {
    loop {
        A::wait_for_interrupt();
    }
}
