//! A tick-driven soft-timer scheduling engine.
//!
//! The engine multiplexes any number of software timers onto a single
//! hardware alarm. Armed timers are kept in a pairing heap keyed by expiry
//! tick; the earliest expiry is published to the port, and when that tick
//! arrives the port calls [`dispatch`], which pops every due timer and hands
//! its callback to the port's deferred-callback queue. Callbacks never run
//! under the scheduler lock.
//!
//! Tick counts wrap modulo [`ticks::TICKS_PERIOD`]; all comparisons go
//! through [`ticks::ticks_diff`], so the engine runs forever without an epoch.
//!
//! # Ports
//!
//! The engine is instantiated against a *traits type* implementing
//! [`PortThreading`], [`PortTimer`], and [`PortCallback`]. A port provides a
//! `use_port!`-style macro that defines the traits type, the backing
//! `static`s, and the trait implementations. See the `softtimer_port_std`
//! crate for a hosted reference port.
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod klock;
mod sched;
mod timer;

pub mod ticks;
pub mod utils;

pub use self::{
    error::{
        DeinitError, NewTimerError, QueryTimerError, SetIntervalError, StartTimerError,
        StopTimerError,
    },
    sched::{deinit, dispatch, State},
    timer::{Interval, StaticArena, Timer, TimerCb, TimerMode},
};

use self::{ticks::UTicks, utils::VecLike};

/// Implemented by a port. Provides the scheduler lock, the engine's sole
/// mutual-exclusion primitive.
///
/// On bare metal this is typically "raise the basepri/interrupt mask above
/// the tick interrupt"; on a hosted port it's an ordinary try-lock.
///
/// # Safety
///
/// These methods are only meant to be called by the engine.
pub unsafe trait PortThreading: Sized + 'static {
    /// Attempt to acquire the scheduler lock. Return `false` if it's already
    /// held.
    unsafe fn try_enter_sched_lock() -> bool;

    /// Release the scheduler lock.
    ///
    /// # Safety
    ///
    /// The lock must be held by the caller.
    unsafe fn leave_sched_lock();

    /// Whether the scheduler lock is currently held.
    fn is_sched_lock_active() -> bool;
}

/// Implemented by a port. Provides the tick source and the one-shot alarm the
/// engine schedules itself on.
///
/// # Safety
///
/// These methods are only meant to be called by the engine.
pub unsafe trait PortTimer: Sized + 'static {
    /// The number of ticks per second, used to convert
    /// [`Interval::Millis`] and [`Interval::Hz`].
    const TICKS_PER_SECOND: UTicks;

    /// The current tick count, in `0..TICKS_PERIOD`.
    ///
    /// [`TICKS_PERIOD`]: crate::ticks::TICKS_PERIOD
    ///
    /// # Safety
    ///
    /// The scheduler lock must be held.
    unsafe fn tick_count() -> UTicks;

    /// Arrange for [`dispatch`] to be called when the tick count reaches
    /// `at`. Overwrites any previously pended wake-up.
    ///
    /// `at` is never more than [`TICKS_MAX_DELTA`] ticks in the future. The
    /// port may also call `dispatch` spuriously at any other time.
    ///
    /// [`TICKS_MAX_DELTA`]: crate::ticks::TICKS_MAX_DELTA
    ///
    /// # Safety
    ///
    /// The scheduler lock must be held.
    unsafe fn pend_dispatch_at(at: UTicks);

    /// Retract a pended wake-up, if any.
    ///
    /// # Safety
    ///
    /// The scheduler lock must be held.
    unsafe fn suppress_dispatch();
}

/// Implemented by a port. Receives expired timers' callbacks.
///
/// # Safety
///
/// This method is only meant to be called by the engine.
pub unsafe trait PortCallback: Sized + 'static {
    /// Queue `callback(param)` for execution outside the scheduler lock.
    ///
    /// Called from [`dispatch`] with the scheduler lock held, so the
    /// implementation must not call back into the timer API.
    fn schedule_callback(callback: fn(usize), param: usize);
}

/// The traits type of a fully configured engine instance.
///
/// # Safety
///
/// Implemented by a port's instantiation macro, which guarantees that
/// `state()` returns a `static` used by no other traits type.
pub unsafe trait SoftTimerTraits: PortThreading + PortTimer + PortCallback + 'static {
    /// The storage backing the timer slots.
    type TimerArena: VecLike<Element = TimerCb> + Send + 'static;

    /// The engine-global state.
    fn state() -> &'static State<Self, Self::TimerArena>;
}
