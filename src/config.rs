//! Build-time kernel configuration.
//!
//! Capacities are const generics on the kernel types; the values here are the
//! defaults used by [`DefaultKernel`](crate::DefaultKernel) and the timing
//! constants for an 80 MHz TM4C123 bus clock.

/// Bus clock the SysTick counts, in Hz.
pub const BUS_CLOCK_HZ: u32 = 80_000_000;

/// Bus cycles in one microsecond (12.5 ns per cycle).
pub const CYCLES_PER_US: u32 = BUS_CLOCK_HZ / 1_000_000;

/// Time-slice constants for [`Kernel::launch`](crate::Kernel::launch), in bus cycles.
pub const TIME_1MS: u32 = BUS_CLOCK_HZ / 1_000;
pub const TIME_2MS: u32 = 2 * TIME_1MS;
pub const TIME_500US: u32 = TIME_1MS / 2;
pub const TIME_250US: u32 = TIME_1MS / 4;

/// SysTick is a 24-bit down counter.
pub const MAX_TICK_RELOAD: u32 = 0x00FF_FFFF;

/// Default number of foreground thread slots.
pub const MAX_THREADS: usize = 8;

/// Default per-thread stack size in 32-bit words.
pub const STACK_WORDS: usize = 256;

/// Stack reserved for the idle context, in words.
pub const IDLE_STACK_WORDS: usize = 64;

/// General-purpose timers available for periodic tasks (Timer0A..Timer5B).
pub const MAX_TIMERS: usize = 12;

/// Highest (numerically largest) NVIC priority a periodic task may use.
pub const LOWEST_TIMER_PRIORITY: u8 = 7;

/// Default backing capacity for [`Fifo`](crate::Fifo).
pub const FIFO_CAPACITY: usize = 64;

/// Lowest priority a button task may use (0 is highest).
pub const LOWEST_SWITCH_PRIORITY: u8 = 5;
