//! Time slice conversion and tick-counter arithmetic.

use crate::config::MAX_TICK_RELOAD;

/// Elapsed bus cycles between two samples of the tick down-counter.
///
/// Plain unsigned subtraction: only meaningful when `start` was sampled
/// before `stop` within the same reload period. A wrap between the samples
/// yields a wrong value; nothing detects it.
#[inline]
pub fn time_difference(start: u32, stop: u32) -> u32 {
    start.wrapping_sub(stop)
}

/// Clamp a requested time slice to what the 24-bit tick counter can hold.
pub fn clamp_time_slice(cycles: u32) -> u32 {
    cycles.clamp(1, MAX_TICK_RELOAD + 1)
}

/// Length of one time slice in microseconds, never less than 1 so sleepers
/// always age.
pub fn quantum_us(cycles: u32, clock_hz: u32) -> u32 {
    let cycles_per_us = (clock_hz / 1_000_000).max(1);
    (cycles / cycles_per_us).max(1)
}

/// Convert a sleep request in milliseconds to the microsecond unit the sleep
/// set ages in. Widened so the full `u32` millisecond range is exact.
#[inline]
pub fn ms_to_us(ms: u32) -> u64 {
    u64::from(ms) * 1_000
}
