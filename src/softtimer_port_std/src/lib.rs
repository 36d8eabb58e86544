//! Simulation environment for running the `softtimer` engine on a hosted
//! environment.
//!
//! The port replaces the hardware tick counter with a virtual clock that only
//! moves when the test calls [`advance`] (or [`stall`], which moves the clock
//! without servicing wake-ups, imitating a masked dispatch interrupt).
//! Scheduled callbacks accumulate in a queue and run when the test calls
//! [`run_pending_callbacks`], mirroring how a real port drains its deferred
//! callback queue at foreground priority.
//!
//! Use [`use_port!`] to instantiate an engine against this port:
//!
//! ```
//! softtimer_port_std::use_port!(unsafe struct SystemTraits);
//! # fn main() {}
//! ```
#![deny(unsafe_op_in_unsafe_fn)]

use softtimer::{
    ticks::{ticks_add, ticks_diff, UTicks, TICKS_PERIOD},
    SoftTimerTraits,
};
use spin::Mutex as SpinMutex;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

/// Used by `use_port!`
#[doc(hidden)]
pub extern crate softtimer;

/// The tick rate of the virtual clock.
pub const TICKS_PER_SECOND: UTicks = 1000;

#[derive(Debug)]
struct VirtualClock {
    /// The current tick count, in `0..TICKS_PERIOD`.
    now: UTicks,

    /// The wake-up most recently pended by the engine.
    wake: Option<UTicks>,
}

/// The private state of the port, instantiated once per traits type by
/// [`use_port!`].
#[derive(Debug)]
pub struct State {
    clock: SpinMutex<VirtualClock>,

    /// The scheduler lock. On a real target this would be an interrupt mask.
    sched_lock: AtomicBool,

    /// Callbacks handed over by the engine, waiting to be drained by
    /// [`run_pending_callbacks`].
    callback_queue: SpinMutex<VecDeque<(fn(usize), usize)>>,
}

#[allow(clippy::new_without_default)]
impl State {
    pub const fn new() -> Self {
        Self {
            clock: SpinMutex::new(VirtualClock {
                now: 0,
                wake: None,
            }),
            sched_lock: AtomicBool::new(false),
            callback_queue: SpinMutex::new(VecDeque::new()),
        }
    }

    pub fn tick_count(&self) -> UTicks {
        self.clock.lock().now
    }

    pub fn pend_dispatch_at(&self, at: UTicks) {
        log::trace!("pend_dispatch_at({at})");
        self.clock.lock().wake = Some(at);
    }

    pub fn suppress_dispatch(&self) {
        log::trace!("suppress_dispatch");
        self.clock.lock().wake = None;
    }

    pub fn try_enter_sched_lock(&self) -> bool {
        !self.sched_lock.swap(true, Ordering::Acquire)
    }

    pub fn leave_sched_lock(&self) {
        self.sched_lock.store(false, Ordering::Release);
    }

    pub fn is_sched_lock_active(&self) -> bool {
        self.sched_lock.load(Ordering::Relaxed)
    }

    pub fn schedule_callback(&self, callback: fn(usize), param: usize) {
        log::trace!("schedule_callback(_, {param})");
        self.callback_queue.lock().push_back((callback, param));
    }
}

/// Implemented on a traits type by [`use_port!`].
///
/// # Safety
///
/// Only meant to be implemented by [`use_port!`].
pub unsafe trait PortInstance: SoftTimerTraits {
    fn port_state() -> &'static State;
}

/// The current value of the virtual clock.
pub fn now<Traits: PortInstance>() -> UTicks {
    Traits::port_state().tick_count()
}

/// Set the virtual clock to an arbitrary tick count.
///
/// Useful for placing a test scenario near the wrap-around point. Any pended
/// wake-up is retained, so call this before arming timers.
pub fn set_now<Traits: PortInstance>(now: UTicks) {
    Traits::port_state().clock.lock().now = now & (TICKS_PERIOD - 1);
}

/// Advance the virtual clock by `ticks`, one tick at a time, servicing
/// pended wake-ups as they come due.
pub fn advance<Traits: PortInstance>(ticks: UTicks) {
    let state = Traits::port_state();
    for _ in 0..ticks {
        let due = {
            let mut clock = state.clock.lock();
            clock.now = ticks_add(clock.now, 1);
            match clock.wake {
                Some(wake) if ticks_diff(wake, clock.now) <= 0 => {
                    clock.wake = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            log::trace!("advance: dispatching at {}", now::<Traits>());
            // Safety: this thread does not hold the scheduler lock
            unsafe { softtimer::dispatch::<Traits>() };
        }
    }
}

/// Advance the virtual clock by `ticks` without servicing wake-ups,
/// imitating a stretch of time where the dispatch interrupt is masked.
///
/// A wake-up that came due during the stall fires on the next [`advance`].
pub fn stall<Traits: PortInstance>(ticks: UTicks) {
    let state = Traits::port_state();
    let mut clock = state.clock.lock();
    clock.now = ticks_add(clock.now, ticks);
    log::trace!("stall: clock is now {}", clock.now);
}

/// Run every callback scheduled so far, in FIFO order. Returns how many ran.
///
/// The callbacks run with no locks held, so they are free to call back into
/// the timer API (to re-arm themselves, for example).
pub fn run_pending_callbacks<Traits: PortInstance>() -> usize {
    let state = Traits::port_state();
    let mut count = 0;
    loop {
        let front = state.callback_queue.lock().pop_front();
        let Some((callback, param)) = front else {
            break;
        };
        callback(param);
        count += 1;
    }
    count
}

/// The number of callbacks scheduled but not yet drained.
pub fn num_pending_callbacks<Traits: PortInstance>() -> usize {
    Traits::port_state().callback_queue.lock().len()
}

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

/// Initialize `env_logger`. Idempotent, so every test can call it.
pub fn init_logger() {
    once_cell::sync::Lazy::force(&LOGGER_INIT);
}

/// Define a traits type implementing the engine's port traits, backed by this
/// port and a fixed-capacity timer arena (16 slots unless specified).
#[macro_export]
macro_rules! use_port {
    (unsafe $vis:vis struct $SystemTraits:ident) => {
        $crate::use_port!(unsafe $vis struct $SystemTraits { capacity: 16 });
    };
    (unsafe $vis:vis struct $SystemTraits:ident { capacity: $capacity:expr }) => {
        $vis struct $SystemTraits;

        mod port_std_impl {
            use super::$SystemTraits;
            use $crate::softtimer::{
                ticks::UTicks, PortCallback, PortThreading, PortTimer, SoftTimerTraits,
                State, StaticArena,
            };
            use $crate::{PortInstance, State as PortState};

            pub(super) static PORT_STATE: PortState = PortState::new();
            static KERNEL_STATE: State<$SystemTraits, StaticArena<{ $capacity }>> = State::INIT;

            unsafe impl PortInstance for $SystemTraits {
                #[inline]
                fn port_state() -> &'static PortState {
                    &PORT_STATE
                }
            }

            unsafe impl PortThreading for $SystemTraits {
                unsafe fn try_enter_sched_lock() -> bool {
                    PORT_STATE.try_enter_sched_lock()
                }

                unsafe fn leave_sched_lock() {
                    PORT_STATE.leave_sched_lock()
                }

                fn is_sched_lock_active() -> bool {
                    PORT_STATE.is_sched_lock_active()
                }
            }

            unsafe impl PortTimer for $SystemTraits {
                const TICKS_PER_SECOND: UTicks = $crate::TICKS_PER_SECOND;

                unsafe fn tick_count() -> UTicks {
                    PORT_STATE.tick_count()
                }

                unsafe fn pend_dispatch_at(at: UTicks) {
                    PORT_STATE.pend_dispatch_at(at)
                }

                unsafe fn suppress_dispatch() {
                    PORT_STATE.suppress_dispatch()
                }
            }

            unsafe impl PortCallback for $SystemTraits {
                fn schedule_callback(callback: fn(usize), param: usize) {
                    PORT_STATE.schedule_callback(callback, param)
                }
            }

            unsafe impl SoftTimerTraits for $SystemTraits {
                type TimerArena = StaticArena<{ $capacity }>;

                #[inline]
                fn state() -> &'static State<Self, Self::TimerArena> {
                    &KERNEL_STATE
                }
            }
        }
    };
}
