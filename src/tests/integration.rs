//! Integration tests driving the kernel through tick and switch sequences,
//! and the primitives across real std threads.

#[cfg(test)]
mod scheduling_tests {
    use crate::arch::frame;
    use crate::arch::host::{self, HostArch};
    use crate::errors::SpawnError;
    use crate::kernel::Kernel;
    use crate::tests::helpers::*;
    use crate::thread::ThreadState;

    #[test]
    fn test_round_robin_rotation() {
        let kernel = launched(&[task_a, task_b, task_c]);
        assert!(kernel.is_launched());
        assert_eq!(running(&kernel), 1);

        let mut seen = std::vec::Vec::new();
        for _ in 0..6 {
            kernel.tick();
            switch(&kernel);
            seen.push(running(&kernel));
        }
        assert_eq!(seen, [2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_every_tick_pends_a_switch() {
        let kernel = launched(&[task_a]);
        host::take_pended_switches();
        kernel.tick();
        kernel.tick();
        assert_eq!(host::take_pended_switches(), 2);
        kernel.suspend();
        assert_eq!(host::take_pended_switches(), 1);
    }

    #[test]
    fn test_suspend_keeps_thread_ready() {
        let kernel = launched(&[task_a, task_b]);
        kernel.suspend();
        switch(&kernel);
        assert_eq!(running(&kernel), 2);
        assert_eq!(ready_order(&kernel), [2, 1]);
        // sleep(0) is a plain yield.
        kernel.sleep(0);
        switch(&kernel);
        assert_eq!(running(&kernel), 1);
        assert_eq!(kernel.stats().sleeping, 0);
    }

    #[test]
    fn test_first_launched_frame_is_initial_frame() {
        let kernel = launched(&[task_a]);
        let sp = kernel.running_sp();
        let stack = kernel.stack_of(0);
        let base = stack.as_ptr() as usize;
        let index = (sp - base) / 4;
        assert_eq!(index, stack.len() - frame::FRAME_WORDS);
        assert_eq!(stack[index + frame::PC], (task_a as usize as u32) & !1);
        assert_eq!(stack[index + frame::XPSR], frame::INITIAL_XPSR);
    }

    #[test]
    fn test_custom_stack_size_uses_top_of_region() {
        let kernel = new_kernel();
        kernel.add_thread(task_a, 128, 0).expect("valid stack");
        let sp = kernel.inspect(|state| state.store[0].sp);
        let stack = kernel.stack_of(0);
        let end = stack.as_ptr() as usize + stack.len() * 4;
        assert_eq!(end - sp, frame::FRAME_WORDS * 4);
        assert!(sp >= end - 128);
    }

    #[test]
    fn test_invalid_stack_sizes_rejected() {
        let kernel = new_kernel();
        assert_eq!(kernel.add_thread(task_a, 100, 0), Err(SpawnError::InvalidStackSize(100)));
        assert_eq!(kernel.add_thread(task_a, 16, 0), Err(SpawnError::InvalidStackSize(16)));
        assert_eq!(kernel.add_thread(task_a, 520, 0), Err(SpawnError::InvalidStackSize(520)));
        assert_eq!(kernel.stats().free, 4);
        assert!(kernel.add_thread(task_a, 72, 0).is_ok());
        assert!(kernel.add_thread(task_b, 512, 0).is_ok());
    }

    #[test]
    fn test_capacity_limit_leaves_list_untouched() {
        let kernel = new_kernel();
        for entry in [task_a, task_b, task_c, task_d] {
            kernel.add_thread(entry, 0, 3).expect("slot available");
        }
        assert_eq!(kernel.add_thread(task_a, 0, 3), Err(SpawnError::TooManyThreads));
        assert_eq!(kernel.stats().ready, 4);
        assert_eq!(kernel.stats().free, 0);
        assert_eq!(ready_order(&kernel), [1, 2, 3, 4]);
        kernel.inspect(|state| check_invariants(state));
    }

    #[test]
    fn test_sleep_returns_after_at_least_the_delay() {
        let kernel = launched(&[task_a, task_b, task_c]);
        kernel.sleep(2);
        assert_eq!(kernel.stats().sleeping, 1);
        assert_eq!(ready_order(&kernel), [2, 3]);

        switch(&kernel);
        assert_eq!(running(&kernel), 2);

        // 1 ms quantum: still asleep after one tick.
        kernel.tick();
        switch(&kernel);
        assert_eq!(running(&kernel), 3);
        assert_eq!(kernel.stats().sleeping, 1);

        // Second tick wakes it directly after the running thread.
        kernel.tick();
        assert_eq!(ready_order(&kernel), [3, 1, 2]);
        switch(&kernel);
        assert_eq!(running(&kernel), 1);
        kernel.inspect(|state| check_invariants(state));
    }

    #[test]
    fn test_idle_when_every_thread_sleeps() {
        let kernel = launched(&[task_a]);
        kernel.sleep(1);
        let sp = switch(&kernel);
        assert_eq!(running(&kernel), 0);
        assert_eq!(kernel.id(), None);
        assert_eq!(sp, kernel.inspect(|state| state.idle_sp));
        assert_ne!(sp, 0);

        let a_sp = kernel.inspect(|state| state.store[0].sp);
        kernel.tick();
        assert_eq!(switch(&kernel), a_sp);
        assert_eq!(running(&kernel), 1);
    }

    #[test]
    fn test_launch_with_no_threads_idles() {
        let kernel = new_kernel();
        let (_, sp) = kernel.prepare_launch(2 * crate::config::TIME_1MS);
        assert_eq!(sp, kernel.inspect(|state| state.idle_sp));
        assert_eq!(kernel.id(), None);
    }

    #[test]
    fn test_kill_reclaims_slot_after_switch() {
        let kernel = launched(&[task_a, task_b, task_c]);
        let killed = kernel.retire_current().expect("thread running");
        assert_eq!(killed.get(), 1);
        assert_eq!(kernel.thread_state(killed), Some(ThreadState::Dead));
        assert_eq!(kernel.stats().dead, 1);
        assert_eq!(kernel.stats().free, 1);

        switch(&kernel);
        assert_eq!(running(&kernel), 2);
        assert_eq!(kernel.thread_state(killed), None);
        assert_eq!(kernel.stats().free, 2);

        // The freed slot is reused but the id is fresh.
        let id = kernel.add_thread(task_d, 0, 1).expect("slot available");
        assert_eq!(id.get(), 4);
        assert_eq!(kernel.inspect(|state| state.store[0].id()), Some(id));
        assert_eq!(ready_order(&kernel), [2, 3, 4]);
        kernel.inspect(|state| check_invariants(state));
    }

    #[test]
    fn test_killing_last_thread_falls_back_to_idle() {
        let kernel = launched(&[task_a]);
        kernel.retire_current();
        let sp = switch(&kernel);
        assert_eq!(sp, kernel.inspect(|state| state.idle_sp));
        assert_eq!(kernel.stats().free, 4);
    }

    #[test]
    fn test_ms_clock_follows_ticks() {
        let kernel = launched(&[task_a]);
        for _ in 0..5 {
            kernel.tick();
        }
        assert_eq!(kernel.ms_time(), 5);
        kernel.clear_ms_time();
        assert_eq!(kernel.ms_time(), 0);

        let fine = Kernel::<HostArch, 2, 64>::new();
        fine.prepare_launch(crate::config::TIME_250US);
        for _ in 0..7 {
            fine.tick();
        }
        assert_eq!(fine.ms_time(), 1);
    }

    #[test]
    fn test_time_reads_tick_counter() {
        let kernel = launched(&[task_a]);
        host::set_tick_value(70_000);
        let start = kernel.time();
        host::set_tick_value(69_200);
        let stop = kernel.time();
        assert_eq!(crate::time::time_difference(start, stop), 800);
    }

    #[test]
    fn test_time_slice_is_clamped() {
        let kernel = new_kernel();
        let (reload, _) = kernel.prepare_launch(0);
        assert_eq!(reload, 1);
        assert_eq!(kernel.inspect(|state| state.quantum_us), 1);

        let kernel = new_kernel();
        let (reload, _) = kernel.prepare_launch(0x0200_0000);
        assert_eq!(reload, 0x0100_0000);
    }

    #[test]
    fn test_thread_woken_before_its_switch_runs_next() {
        let kernel = launched(&[task_a, task_b, task_c]);
        // A one-quantum sleep expires on the tick that lands before the
        // pended switch.
        kernel.sleep(1);
        kernel.tick();
        assert_eq!(kernel.stats().sleeping, 0);
        switch(&kernel);
        assert_eq!(running(&kernel), 1);

        // Rotation continues normally afterwards.
        kernel.tick();
        switch(&kernel);
        assert_eq!(running(&kernel), 2);
        kernel.inspect(|state| check_invariants(state));
    }

    #[test]
    fn test_wakes_queue_up_while_switch_is_pending() {
        let kernel = launched(&[task_a, task_b, task_c]);
        switch(&kernel);
        kernel.sleep(3);
        switch(&kernel);
        assert_eq!(running(&kernel), 3);

        // Thread 3 sleeps one quantum and three ticks land before its
        // switch: it wakes on the first, thread 2 on the third.
        kernel.sleep(1);
        kernel.tick();
        kernel.tick();
        kernel.tick();
        assert_eq!(ready_order(&kernel), [3, 2, 1]);

        let mut seen = std::vec::Vec::new();
        for _ in 0..3 {
            switch(&kernel);
            seen.push(running(&kernel));
        }
        assert_eq!(seen, [3, 2, 1]);
        kernel.inspect(|state| check_invariants(state));
    }

    #[test]
    fn test_long_sleep_is_not_truncated() {
        let kernel = new_kernel();
        kernel.add_thread(task_a, 0, 1).expect("slot available");
        kernel.add_thread(task_b, 0, 1).expect("slot available");
        // Longest slice: 0x0100_0000 cycles, 209_715 us per tick.
        kernel.prepare_launch(u32::MAX);
        let quantum = u64::from(kernel.inspect(|state| state.quantum_us));
        assert_eq!(quantum, 209_715);

        let delay_ms: u32 = 5_000_000;
        kernel.sleep(delay_ms);
        switch(&kernel);

        let mut ticks: u64 = 0;
        while kernel.stats().sleeping > 0 {
            kernel.tick();
            switch(&kernel);
            ticks += 1;
            assert!(ticks <= 30_000, "sleeper never woke");
        }
        assert!(ticks * quantum >= u64::from(delay_ms) * 1_000);
        assert_eq!(ticks, 23_842);
    }

    #[test]
    fn test_launch_registers_hooks() {
        let kernel: &'static TestKernel = std::boxed::Box::leak(new_kernel());
        kernel.add_thread(task_a, 0, 1).expect("slot available");
        // The host shim cannot enter a thread, so launch ends in a panic
        // after everything else is set up.
        let outcome = std::thread::spawn(move || {
            kernel.launch(crate::config::TIME_1MS);
        })
        .join();
        assert!(outcome.is_err());
        assert!(kernel.is_launched());
        assert!(crate::kernel::hooks().is_some());
    }
}

#[cfg(test)]
mod primitive_tests {
    use crate::arch::host::HostArch;
    use crate::sync::{Fifo, Mailbox, Semaphore};
    use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn test_semaphore_mutual_exclusion() {
        let sem = Arc::new(Semaphore::<HostArch>::new(1));
        let inside = Arc::new(AtomicBool::new(false));
        let entries = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let sem = sem.clone();
                let inside = inside.clone();
                let entries = entries.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        sem.wait();
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        entries.fetch_add(1, Ordering::SeqCst);
                        inside.store(false, Ordering::SeqCst);
                        sem.signal();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }
        assert_eq!(entries.load(Ordering::SeqCst), 800);
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn test_wait_blocks_until_signal() {
        let sem = Arc::new(Semaphore::<HostArch>::new(0));
        let passed = Arc::new(AtomicBool::new(false));
        let waiter = {
            let sem = sem.clone();
            let passed = passed.clone();
            thread::spawn(move || {
                sem.wait();
                passed.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!passed.load(Ordering::SeqCst));
        sem.signal();
        waiter.join().expect("waiter panicked");
        assert!(passed.load(Ordering::SeqCst));
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn test_mailbox_rendezvous_in_order() {
        let mailbox = Arc::new(Mailbox::<HostArch, u32>::new());
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for v in 1..=100 {
                    mailbox.send(v);
                }
            })
        };
        for v in 1..=100 {
            assert_eq!(mailbox.recv(), v);
        }
        producer.join().expect("producer panicked");
        assert_eq!(mailbox.try_recv(), None);
    }

    #[test]
    fn test_fifo_producer_consumer() {
        let fifo = Arc::new(Fifo::<u32, 16>::new());
        let producer = {
            let fifo = fifo.clone();
            thread::spawn(move || {
                let mut v = 0;
                while v < 1000 {
                    if fifo.put(v).is_ok() {
                        v += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            })
        };
        for v in 0..1000 {
            assert_eq!(fifo.get(), v);
        }
        producer.join().expect("producer panicked");
        assert!(fifo.is_empty());
    }
}

#[cfg(test)]
mod periodic_tests {
    use crate::arch::host::HostArch;
    use crate::config::BUS_CLOCK_HZ;
    use crate::errors::TimerError;
    use crate::periodic::{PeriodicTasks, TimerDriver};
    use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockTimers {
        enabled: AtomicU32,
        acks: AtomicUsize,
        reloads: [AtomicU32; 12],
        cleared: AtomicU32,
    }

    impl TimerDriver for MockTimers {
        fn bind(&self, timer: usize, frequency_hz: u32, _priority: u8) -> Result<(), TimerError> {
            if frequency_hz > BUS_CLOCK_HZ {
                return Err(TimerError::Hardware);
            }
            self.reloads[timer].store(BUS_CLOCK_HZ / frequency_hz, Ordering::SeqCst);
            Ok(())
        }

        fn enable_interrupt(&self, timer: usize) {
            self.enabled.fetch_or(1 << timer, Ordering::SeqCst);
        }

        fn disable_interrupt(&self, timer: usize) {
            self.enabled.fetch_and(!(1 << timer), Ordering::SeqCst);
        }

        fn acknowledge(&self, _timer: usize) {
            self.acks.fetch_add(1, Ordering::SeqCst);
        }

        fn clear_elapsed(&self, timer: usize) {
            self.cleared.fetch_or(1 << timer, Ordering::SeqCst);
        }

        fn period(&self, timer: usize) -> u32 {
            self.reloads[timer].load(Ordering::SeqCst)
        }

        fn value(&self, timer: usize) -> u32 {
            self.reloads[timer].load(Ordering::SeqCst) / 2
        }
    }

    static SAMPLE_RUNS: AtomicUsize = AtomicUsize::new(0);
    fn sample_task() {
        SAMPLE_RUNS.fetch_add(1, Ordering::SeqCst);
    }

    static CONTROL_RUNS: AtomicUsize = AtomicUsize::new(0);
    fn control_task() {
        CONTROL_RUNS.fetch_add(1, Ordering::SeqCst);
    }

    fn noop() {}

    #[test]
    fn test_bind_and_dispatch() {
        let tasks = PeriodicTasks::<HostArch, _>::new(MockTimers::default());
        tasks.add_periodic_thread(sample_task, 1, 1000, 2).expect("bind");
        assert_eq!(tasks.driver().enabled.load(Ordering::SeqCst), 0b10);
        assert_eq!(tasks.read_period(1), Ok(80_000));
        assert_eq!(tasks.read_value(1), Ok(40_000));

        for _ in 0..3 {
            assert!(tasks.dispatch(1));
        }
        assert_eq!(SAMPLE_RUNS.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.driver().acks.load(Ordering::SeqCst), 3);

        // Unbound timer: acknowledged, nothing runs.
        assert!(!tasks.dispatch(0));
        assert!(!tasks.dispatch(12));
    }

    #[test]
    fn test_bind_validation() {
        let tasks = PeriodicTasks::<HostArch, _>::new(MockTimers::default());
        assert_eq!(tasks.add_periodic_thread(noop, 12, 100, 1), Err(TimerError::InvalidTimer(12)));
        assert_eq!(tasks.add_periodic_thread(noop, 0, 100, 8), Err(TimerError::InvalidPriority(8)));
        assert_eq!(tasks.add_periodic_thread(noop, 0, 0, 1), Err(TimerError::InvalidFrequency(0)));
        assert_eq!(
            tasks.add_periodic_thread(noop, 0, BUS_CLOCK_HZ + 1, 1),
            Err(TimerError::Hardware)
        );
        assert!(tasks.task(0).is_none());

        tasks.add_periodic_thread(noop, 0, 100, 7).expect("bind");
        assert_eq!(tasks.add_periodic_thread(noop, 0, 50, 7), Err(TimerError::TimerInUse(0)));
        assert_eq!(tasks.task(0).map(|t| t.frequency_hz), Some(100));
    }

    #[test]
    fn test_stop_launch_and_remove() {
        let tasks = PeriodicTasks::<HostArch, _>::new(MockTimers::default());
        tasks.add_periodic_thread(control_task, 3, 10, 0).expect("bind");
        tasks.add_periodic_thread(noop, 5, 10, 0).expect("bind");

        tasks.stop_thread(3).expect("bound");
        assert_eq!(tasks.driver().enabled.load(Ordering::SeqCst), 1 << 5);
        assert!(!tasks.dispatch(3));
        assert_eq!(CONTROL_RUNS.load(Ordering::SeqCst), 0);

        tasks.stop_thread(5).expect("bound");
        assert_eq!(tasks.launch_all(), 2);
        assert_eq!(tasks.driver().enabled.load(Ordering::SeqCst), (1 << 3) | (1 << 5));
        assert!(tasks.dispatch(3));
        assert_eq!(CONTROL_RUNS.load(Ordering::SeqCst), 1);

        assert!(tasks.remove(3).is_ok());
        assert_eq!(tasks.remove(3).err(), Some(TimerError::NotBound(3)));
        assert_eq!(tasks.launch_thread(3), Err(TimerError::NotBound(3)));
        assert_eq!(tasks.driver().enabled.load(Ordering::SeqCst), 1 << 5);
        assert!(!tasks.dispatch(3));
    }

    #[test]
    fn test_clear_periodic_time() {
        let tasks = PeriodicTasks::<HostArch, _>::new(MockTimers::default());
        tasks.clear_periodic_time(4).expect("valid timer");
        assert_eq!(tasks.driver().cleared.load(Ordering::SeqCst), 1 << 4);
        assert_eq!(tasks.clear_periodic_time(20), Err(TimerError::InvalidTimer(20)));
    }
}

#[cfg(test)]
mod switch_task_tests {
    use crate::arch::host::HostArch;
    use crate::errors::SwitchError;
    use crate::switches::{Switch, SwitchDriver, SwitchTasks};
    use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockButtons {
        armed: AtomicU32,
        acks: AtomicUsize,
        broken: bool,
    }

    impl SwitchDriver for MockButtons {
        fn arm(&self, switch: Switch, _priority: u8) -> Result<(), SwitchError> {
            if self.broken {
                return Err(SwitchError::Hardware);
            }
            self.armed.fetch_or(1 << switch as u32, Ordering::SeqCst);
            Ok(())
        }

        fn disarm(&self, switch: Switch) {
            self.armed.fetch_and(!(1 << switch as u32), Ordering::SeqCst);
        }

        fn acknowledge(&self, _switch: Switch) {
            self.acks.fetch_add(1, Ordering::SeqCst);
        }
    }

    static SW1_PRESSES: AtomicUsize = AtomicUsize::new(0);
    fn on_sw1() {
        SW1_PRESSES.fetch_add(1, Ordering::SeqCst);
    }

    static SW2_PRESSES: AtomicUsize = AtomicUsize::new(0);
    fn on_sw2() {
        SW2_PRESSES.fetch_add(1, Ordering::SeqCst);
    }

    fn noop() {}

    #[test]
    fn test_press_runs_bound_task() {
        let buttons = SwitchTasks::<HostArch, _>::new(MockButtons::default());
        buttons.add_sw1_task(on_sw1, 2).expect("bind");
        buttons.add_sw2_task(on_sw2, 5).expect("bind");
        assert_eq!(buttons.driver().armed.load(Ordering::SeqCst), 0b11);

        assert!(buttons.dispatch(Switch::Sw1));
        assert!(buttons.dispatch(Switch::Sw1));
        assert!(buttons.dispatch(Switch::Sw2));
        assert_eq!(SW1_PRESSES.load(Ordering::SeqCst), 2);
        assert_eq!(SW2_PRESSES.load(Ordering::SeqCst), 1);
        assert_eq!(buttons.driver().acks.load(Ordering::SeqCst), 3);
        assert_eq!(buttons.task(Switch::Sw2).map(|t| t.priority), Some(5));
    }

    #[test]
    fn test_bind_rejects_bad_priority_and_second_task() {
        let buttons = SwitchTasks::<HostArch, _>::new(MockButtons::default());
        assert_eq!(buttons.add_sw1_task(noop, 6), Err(SwitchError::InvalidPriority(6)));
        assert!(buttons.task(Switch::Sw1).is_none());

        buttons.add_sw1_task(noop, 0).expect("bind");
        assert_eq!(
            buttons.add_task(Switch::Sw1, noop, 1),
            Err(SwitchError::AlreadyBound(Switch::Sw1))
        );
        assert_eq!(buttons.task(Switch::Sw1).map(|t| t.priority), Some(0));
    }

    #[test]
    fn test_driver_failure_leaves_switch_unbound() {
        let driver = MockButtons {
            broken: true,
            ..MockButtons::default()
        };
        let buttons = SwitchTasks::<HostArch, _>::new(driver);
        assert_eq!(buttons.add_sw2_task(noop, 3), Err(SwitchError::Hardware));
        assert!(buttons.task(Switch::Sw2).is_none());
        assert!(!buttons.dispatch(Switch::Sw2));
    }

    #[test]
    fn test_remove_disarms() {
        let buttons = SwitchTasks::<HostArch, _>::new(MockButtons::default());
        buttons.add_sw2_task(noop, 1).expect("bind");
        assert!(buttons.remove(Switch::Sw2).is_ok());
        assert_eq!(buttons.driver().armed.load(Ordering::SeqCst), 0);
        assert_eq!(buttons.remove(Switch::Sw2).err(), Some(SwitchError::NotBound(Switch::Sw2)));
        assert!(!buttons.dispatch(Switch::Sw2));
        // The switch can be bound again once free.
        buttons.add_sw2_task(noop, 4).expect("rebind");
    }
}
