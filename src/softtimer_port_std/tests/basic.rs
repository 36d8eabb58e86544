//! One-shot timer lifecycle scenarios.
use softtimer::{Interval, Timer, TimerMode};
use softtimer_port_std as port;

mod one_shot_round_trip {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static COUNT: AtomicUsize = AtomicUsize::new(0);

    fn cb(param: usize) {
        assert_eq!(param, 42);
        COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn one_shot_round_trip() {
        port::init_logger();

        let timer =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(10), cb, 42).unwrap();
        timer.start().unwrap();
        assert!(timer.is_armed().unwrap());

        // One tick short of the expiry: nothing happens.
        port::advance::<SystemTraits>(9);
        assert_eq!(port::num_pending_callbacks::<SystemTraits>(), 0);

        // The expiry tick queues the callback but doesn't run it.
        port::advance::<SystemTraits>(1);
        assert_eq!(port::num_pending_callbacks::<SystemTraits>(), 1);
        assert_eq!(COUNT.load(Ordering::Relaxed), 0);

        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 1);
        assert_eq!(COUNT.load(Ordering::Relaxed), 1);

        // A one-shot timer disarms itself and stays quiet.
        assert!(!timer.is_armed().unwrap());
        port::advance::<SystemTraits>(100);
        assert_eq!(port::num_pending_callbacks::<SystemTraits>(), 0);
    }
}

mod two_timer_round_trip {
    use super::*;
    use std::sync::Mutex;

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static ORDER: Mutex<Vec<usize>> = Mutex::new(Vec::new());

    fn cb(param: usize) {
        ORDER.lock().unwrap().push(param);
    }

    #[test]
    fn two_timer_round_trip() {
        port::init_logger();

        let a = Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(100), cb, 1).unwrap();
        let b = Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(50), cb, 2).unwrap();
        a.start().unwrap();
        b.start().unwrap();

        // At t = 60, only the earlier timer has fired.
        port::advance::<SystemTraits>(60);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 1);
        assert_eq!(*ORDER.lock().unwrap(), vec![2]);
        assert!(a.is_armed().unwrap());
        assert!(!b.is_armed().unwrap());

        // At t = 150, the later one has too, and the queue is empty.
        port::advance::<SystemTraits>(90);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 1);
        assert_eq!(*ORDER.lock().unwrap(), vec![2, 1]);
        assert!(!a.is_armed().unwrap());

        port::advance::<SystemTraits>(200);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 0);
    }
}

mod stop_before_expiry {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static COUNT: AtomicUsize = AtomicUsize::new(0);

    fn cb(_: usize) {
        COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn stop_before_expiry() {
        port::init_logger();

        let timer =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(10), cb, 0).unwrap();
        timer.start().unwrap();
        port::advance::<SystemTraits>(5);
        timer.stop().unwrap();
        assert!(!timer.is_armed().unwrap());

        // The stale wake-up at t = 10 produces a dispatch that finds nothing
        // due.
        port::advance::<SystemTraits>(20);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 0);
        assert_eq!(COUNT.load(Ordering::Relaxed), 0);
    }
}

mod stop_is_idempotent {
    use super::*;

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    fn cb(_: usize) {}

    #[test]
    fn stop_is_idempotent() {
        port::init_logger();

        let timer =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(10), cb, 0).unwrap();
        timer.stop().unwrap();
        timer.start().unwrap();
        timer.stop().unwrap();
        timer.stop().unwrap();
        assert!(!timer.is_armed().unwrap());
    }
}

mod rearm_moves_expiry {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static COUNT: AtomicUsize = AtomicUsize::new(0);

    fn cb(_: usize) {
        COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn rearm_moves_expiry() {
        port::init_logger();

        let timer =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(10), cb, 0).unwrap();
        timer.start().unwrap();

        // Re-arming half-way through pushes the expiry out to t = 15.
        port::advance::<SystemTraits>(5);
        timer.start().unwrap();

        port::advance::<SystemTraits>(9);
        port::run_pending_callbacks::<SystemTraits>();
        assert_eq!(COUNT.load(Ordering::Relaxed), 0);

        port::advance::<SystemTraits>(1);
        port::run_pending_callbacks::<SystemTraits>();
        assert_eq!(COUNT.load(Ordering::Relaxed), 1);
    }
}

mod expiry_order {
    use super::*;
    use std::sync::Mutex;

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static ORDER: Mutex<Vec<usize>> = Mutex::new(Vec::new());

    fn cb(param: usize) {
        ORDER.lock().unwrap().push(param);
    }

    #[test]
    fn expiry_order() {
        port::init_logger();

        let slow =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(5), cb, 1).unwrap();
        let fast =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(3), cb, 2).unwrap();
        let mid =
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(4), cb, 3).unwrap();
        slow.start().unwrap();
        fast.start().unwrap();
        mid.start().unwrap();

        port::advance::<SystemTraits>(10);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 3);
        assert_eq!(*ORDER.lock().unwrap(), vec![2, 3, 1]);
    }
}

mod deinit_disarms_all {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    softtimer_port_std::use_port!(unsafe struct SystemTraits);

    static COUNT: AtomicUsize = AtomicUsize::new(0);

    fn cb(_: usize) {
        COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn deinit_disarms_all() {
        port::init_logger();

        let timers = [
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(5), cb, 0).unwrap(),
            Timer::<SystemTraits>::new(TimerMode::Periodic, Interval::Ticks(7), cb, 1).unwrap(),
            Timer::<SystemTraits>::new(TimerMode::OneShot, Interval::Ticks(9), cb, 2).unwrap(),
        ];
        for timer in timers {
            timer.start().unwrap();
        }

        softtimer::deinit::<SystemTraits>().unwrap();

        for timer in timers {
            assert!(!timer.is_armed().unwrap());
        }
        port::advance::<SystemTraits>(50);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 0);
        assert_eq!(COUNT.load(Ordering::Relaxed), 0);

        // The handles survive deinitialization and can be re-armed.
        timers[0].start().unwrap();
        port::advance::<SystemTraits>(5);
        assert_eq!(port::run_pending_callbacks::<SystemTraits>(), 1);
        assert_eq!(COUNT.load(Ordering::Relaxed), 1);
    }
}
