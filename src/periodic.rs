//! Periodic activation: tasks bound to hardware timers and run straight from
//! the timer's interrupt handler.
//!
//! A periodic task is a plain function with no stack or TCB of its own. It
//! never enters the ready list; each timer interrupt calls it to completion
//! at the timer's priority. Register programming is left to a platform
//! [`TimerDriver`].

use crate::arch::Arch;
use crate::config::{LOWEST_TIMER_PRIORITY, MAX_TIMERS};
use crate::errors::TimerError;
use crate::sync::CriticalSection;
use core::marker::PhantomData;

/// Platform timer peripheral driver.
///
/// Timer ids run `0..MAX_TIMERS`; the table validates them before any call
/// reaches the driver.
pub trait TimerDriver {
    /// Configure `timer` as a periodic down-counter at `frequency_hz` with
    /// its interrupt at `priority`. Leaves the interrupt disabled.
    fn bind(&self, timer: usize, frequency_hz: u32, priority: u8) -> Result<(), TimerError>;

    fn enable_interrupt(&self, timer: usize);

    fn disable_interrupt(&self, timer: usize);

    /// Clear the timeout flag from inside the handler.
    fn acknowledge(&self, timer: usize);

    /// Restart the count from the full period.
    fn clear_elapsed(&self, timer: usize);

    /// Reload value in bus cycles.
    fn period(&self, timer: usize) -> u32;

    /// Current count.
    fn value(&self, timer: usize) -> u32;
}

/// One bound timer.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTask {
    pub task: fn(),
    pub frequency_hz: u32,
    pub priority: u8,
    /// Interrupt enabled
    pub running: bool,
}

/// Table of periodic tasks indexed by timer id.
pub struct PeriodicTasks<A: Arch, D: TimerDriver> {
    driver: D,
    table: spin::Mutex<[Option<PeriodicTask>; MAX_TIMERS]>,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch, D: TimerDriver> PeriodicTasks<A, D> {
    pub const fn new(driver: D) -> Self {
        Self {
            driver,
            table: spin::Mutex::new([None; MAX_TIMERS]),
            _arch: PhantomData,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn check_timer(timer: usize) -> Result<(), TimerError> {
        if timer < MAX_TIMERS {
            Ok(())
        } else {
            Err(TimerError::InvalidTimer(timer))
        }
    }

    /// Bind `task` to `timer`, firing `frequency_hz` times a second at NVIC
    /// `priority` (0 highest, 7 lowest).
    ///
    /// The timer interrupt is enabled immediately, so the task may run before
    /// this returns if interrupts are unmasked.
    pub fn add_periodic_thread(
        &self,
        task: fn(),
        timer: usize,
        frequency_hz: u32,
        priority: u8,
    ) -> Result<(), TimerError> {
        Self::check_timer(timer)?;
        if priority > LOWEST_TIMER_PRIORITY {
            return Err(TimerError::InvalidPriority(priority));
        }
        if frequency_hz == 0 {
            return Err(TimerError::InvalidFrequency(frequency_hz));
        }

        let _cs = CriticalSection::<A>::enter();
        let mut table = self.table.lock();
        if table[timer].is_some() {
            log::warn!("periodic: timer {} already bound", timer);
            return Err(TimerError::TimerInUse(timer));
        }
        self.driver.bind(timer, frequency_hz, priority)?;
        table[timer] = Some(PeriodicTask {
            task,
            frequency_hz,
            priority,
            running: true,
        });
        self.driver.enable_interrupt(timer);
        log::debug!(
            "periodic: timer {} bound at {} Hz, priority {}",
            timer,
            frequency_hz,
            priority
        );
        Ok(())
    }

    fn set_running(&self, timer: usize, running: bool) -> Result<(), TimerError> {
        Self::check_timer(timer)?;
        let _cs = CriticalSection::<A>::enter();
        let mut table = self.table.lock();
        let entry = table[timer].as_mut().ok_or(TimerError::NotBound(timer))?;
        entry.running = running;
        if running {
            self.driver.enable_interrupt(timer);
        } else {
            self.driver.disable_interrupt(timer);
        }
        Ok(())
    }

    /// Re-enable a stopped timer's interrupt.
    pub fn launch_thread(&self, timer: usize) -> Result<(), TimerError> {
        self.set_running(timer, true)
    }

    /// Disable the timer interrupt; the binding is kept.
    pub fn stop_thread(&self, timer: usize) -> Result<(), TimerError> {
        self.set_running(timer, false)
    }

    /// Enable every bound timer. Returns how many were started.
    pub fn launch_all(&self) -> usize {
        let _cs = CriticalSection::<A>::enter();
        let mut table = self.table.lock();
        let mut started = 0;
        for (timer, entry) in table.iter_mut().enumerate() {
            if let Some(entry) = entry {
                entry.running = true;
                self.driver.enable_interrupt(timer);
                started += 1;
            }
        }
        started
    }

    /// Disable the timer and forget its task.
    pub fn remove(&self, timer: usize) -> Result<PeriodicTask, TimerError> {
        Self::check_timer(timer)?;
        let _cs = CriticalSection::<A>::enter();
        let removed = self.table.lock()[timer]
            .take()
            .ok_or(TimerError::NotBound(timer))?;
        self.driver.disable_interrupt(timer);
        log::debug!("periodic: timer {} unbound", timer);
        Ok(removed)
    }

    /// Timer interrupt body: acknowledge `timer` and run its task.
    ///
    /// The task runs after the table lock is released, with interrupts in
    /// whatever state the handler entered with. Returns `false` if nothing
    /// running is bound to `timer`.
    pub fn dispatch(&self, timer: usize) -> bool {
        if timer >= MAX_TIMERS {
            return false;
        }
        let task = {
            let _cs = CriticalSection::<A>::enter();
            self.driver.acknowledge(timer);
            let entry = self.table.lock()[timer];
            entry.filter(|entry| entry.running).map(|entry| entry.task)
        };
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn clear_periodic_time(&self, timer: usize) -> Result<(), TimerError> {
        Self::check_timer(timer)?;
        self.driver.clear_elapsed(timer);
        Ok(())
    }

    pub fn read_period(&self, timer: usize) -> Result<u32, TimerError> {
        Self::check_timer(timer)?;
        Ok(self.driver.period(timer))
    }

    pub fn read_value(&self, timer: usize) -> Result<u32, TimerError> {
        Self::check_timer(timer)?;
        Ok(self.driver.value(timer))
    }

    pub fn task(&self, timer: usize) -> Option<PeriodicTask> {
        let _cs = CriticalSection::<A>::enter();
        let entry = self.table.lock().get(timer).copied().flatten();
        entry
    }
}
