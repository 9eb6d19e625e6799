//! Error types for kernel operations.
//!
//! Every detectable failure is reported as a return value; the kernel never
//! panics or unwinds on its own initiative.

#![allow(clippy::uninlined_format_args)]

use crate::switches::Switch;
use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type wrapping the per-area errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread registration errors
    Spawn(SpawnError),
    /// FIFO configuration and overflow errors
    Fifo(FifoError),
    /// Periodic timer binding errors
    Timer(TimerError),
    /// Button task binding errors
    Switch(SwitchError),
}

/// Errors that can occur when registering a foreground thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Every TCB slot is in use
    TooManyThreads,
    /// Stack size not a multiple of 8 or larger than the slot's stack region
    InvalidStackSize(usize),
}

/// FIFO errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoError {
    /// The buffer is full; the sample was dropped
    Full,
    /// Requested size is zero or exceeds the backing capacity
    InvalidSize(usize),
}

/// Periodic-task and timer driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Timer id outside the available timers
    InvalidTimer(usize),
    /// NVIC priority outside 0..=7
    InvalidPriority(u8),
    /// Zero or unreachable frequency
    InvalidFrequency(u32),
    /// A task is already bound to this timer
    TimerInUse(usize),
    /// No task is bound to this timer
    NotBound(usize),
    /// The platform driver refused the configuration
    Hardware,
}

/// Button task errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchError {
    /// Priority outside 0..=5
    InvalidPriority(u8),
    /// A task is already bound to this switch
    AlreadyBound(Switch),
    /// No task is bound to this switch
    NotBound(Switch),
    /// The platform driver could not arm the edge interrupt
    Hardware,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            KernelError::Fifo(e) => write!(f, "FIFO error: {}", e),
            KernelError::Timer(e) => write!(f, "Timer error: {}", e),
            KernelError::Switch(e) => write!(f, "Switch task error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::TooManyThreads => write!(f, "Maximum number of threads reached"),
            SpawnError::InvalidStackSize(size) => write!(f, "Invalid stack size: {}", size),
        }
    }
}

impl fmt::Display for FifoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FifoError::Full => write!(f, "FIFO full, sample dropped"),
            FifoError::InvalidSize(size) => write!(f, "Invalid FIFO size: {}", size),
        }
    }
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::InvalidTimer(id) => write!(f, "Invalid timer id: {}", id),
            TimerError::InvalidPriority(prio) => write!(f, "Invalid timer priority: {}", prio),
            TimerError::InvalidFrequency(freq) => write!(f, "Invalid timer frequency: {} Hz", freq),
            TimerError::TimerInUse(id) => write!(f, "Timer {} already has a task", id),
            TimerError::NotBound(id) => write!(f, "No task bound to timer {}", id),
            TimerError::Hardware => write!(f, "Timer driver rejected the configuration"),
        }
    }
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchError::InvalidPriority(prio) => write!(f, "Invalid switch task priority: {}", prio),
            SwitchError::AlreadyBound(sw) => write!(f, "{:?} already has a task", sw),
            SwitchError::NotBound(sw) => write!(f, "No task bound to {:?}", sw),
            SwitchError::Hardware => write!(f, "Switch driver could not arm the edge interrupt"),
        }
    }
}

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

impl From<FifoError> for KernelError {
    fn from(error: FifoError) -> Self {
        KernelError::Fifo(error)
    }
}

impl From<TimerError> for KernelError {
    fn from(error: TimerError) -> Self {
        KernelError::Timer(error)
    }
}

impl From<SwitchError> for KernelError {
    fn from(error: SwitchError) -> Self {
        KernelError::Switch(error)
    }
}
