//! Background tasks triggered by the two on-board push buttons.
//!
//! Like periodic tasks, a button task has no stack, TCB or thread ID. The
//! GPIO edge handler calls it to completion, so it must not spin, block,
//! sleep or kill. It may signal semaphores and register threads.

use crate::arch::Arch;
use crate::config::LOWEST_SWITCH_PRIORITY;
use crate::errors::SwitchError;
use crate::sync::CriticalSection;
use core::marker::PhantomData;

/// On-board push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    /// PF4
    Sw1 = 0,
    /// PF0
    Sw2 = 1,
}

impl Switch {
    pub const ALL: [Switch; 2] = [Switch::Sw1, Switch::Sw2];

    fn index(self) -> usize {
        self as usize
    }
}

/// Platform GPIO driver for the button pins.
pub trait SwitchDriver {
    /// Configure the pin for edge interrupts at `priority` and enable them.
    fn arm(&self, switch: Switch, priority: u8) -> Result<(), SwitchError>;

    fn disarm(&self, switch: Switch);

    /// Clear the edge flag from inside the handler.
    fn acknowledge(&self, switch: Switch);
}

#[derive(Debug, Clone, Copy)]
pub struct SwitchTask {
    pub task: fn(),
    pub priority: u8,
}

/// Button task bindings, one slot per switch.
pub struct SwitchTasks<A: Arch, D: SwitchDriver> {
    driver: D,
    table: spin::Mutex<[Option<SwitchTask>; 2]>,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch, D: SwitchDriver> SwitchTasks<A, D> {
    pub const fn new(driver: D) -> Self {
        Self {
            driver,
            table: spin::Mutex::new([None; 2]),
            _arch: PhantomData,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run `task` on every press of `switch`. `priority` is 0 (highest)
    /// to 5 (lowest). Each switch takes one task.
    pub fn add_task(&self, switch: Switch, task: fn(), priority: u8) -> Result<(), SwitchError> {
        if priority > LOWEST_SWITCH_PRIORITY {
            return Err(SwitchError::InvalidPriority(priority));
        }
        let _cs = CriticalSection::<A>::enter();
        let mut table = self.table.lock();
        let slot = &mut table[switch.index()];
        if slot.is_some() {
            log::warn!("switches: {:?} already bound", switch);
            return Err(SwitchError::AlreadyBound(switch));
        }
        self.driver.arm(switch, priority)?;
        *slot = Some(SwitchTask { task, priority });
        log::debug!("switches: {:?} bound, priority {}", switch, priority);
        Ok(())
    }

    pub fn add_sw1_task(&self, task: fn(), priority: u8) -> Result<(), SwitchError> {
        self.add_task(Switch::Sw1, task, priority)
    }

    pub fn add_sw2_task(&self, task: fn(), priority: u8) -> Result<(), SwitchError> {
        self.add_task(Switch::Sw2, task, priority)
    }

    /// Disarm `switch` and forget its task.
    pub fn remove(&self, switch: Switch) -> Result<SwitchTask, SwitchError> {
        let _cs = CriticalSection::<A>::enter();
        let removed = self.table.lock()[switch.index()]
            .take()
            .ok_or(SwitchError::NotBound(switch))?;
        self.driver.disarm(switch);
        Ok(removed)
    }

    /// GPIO edge handler body: acknowledge `switch` and run its task outside
    /// the table lock. Returns `false` if no task is bound.
    pub fn dispatch(&self, switch: Switch) -> bool {
        let task = {
            let _cs = CriticalSection::<A>::enter();
            self.driver.acknowledge(switch);
            let entry = self.table.lock()[switch.index()];
            entry.map(|entry| entry.task)
        };
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn task(&self, switch: Switch) -> Option<SwitchTask> {
        let _cs = CriticalSection::<A>::enter();
        let entry = self.table.lock()[switch.index()];
        entry
    }
}
