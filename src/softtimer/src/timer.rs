//! The public timer API.
use core::{fmt, marker::PhantomData};

use crate::{
    error::{
        BadParamError, NewTimerError, QueryTimerError, SetIntervalError, StartTimerError,
        StopTimerError,
    },
    klock::lock_sched,
    sched::{self, TimerGlobalsExt},
    ticks::{ticks_add, UTicks, TICKS_MAX_DELTA},
    utils::{
        pairing_heap::{HeapLinks, PairingHeapNode},
        VecLike,
    },
    SoftTimerTraits,
};

/// Specifies whether a timer fires once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// The timer disarms itself after firing.
    OneShot,
    /// The timer re-arms itself at `expiry + interval` after each firing,
    /// so the average rate is exact even when individual dispatches are
    /// delayed.
    Periodic,
}

/// A relative time span accepted by the timer API.
///
/// Whatever the unit, the span is converted to ticks on entry and clamped to
/// at least one tick, so a zero-length interval fires on the next tick rather
/// than immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Raw ticks.
    Ticks(UTicks),
    /// Milliseconds, converted using [`PortTimer::TICKS_PER_SECOND`].
    ///
    /// [`PortTimer::TICKS_PER_SECOND`]: crate::PortTimer::TICKS_PER_SECOND
    Millis(u32),
    /// A frequency; the interval is its reciprocal. `Hz(0)` is rejected.
    Hz(u32),
}

/// The state of one timer slot.
///
/// This type is `pub` only so that the port macro can name the arena type.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub struct TimerCb {
    pub(super) mode: TimerMode,

    /// The reload value for periodic timers and the default delay for
    /// [`Timer::start`], in ticks. Always in `1..=TICKS_MAX_DELTA`.
    pub(super) interval: UTicks,

    /// The tick at which this timer fires. Only meaningful while `linked`.
    pub(super) expiry: UTicks,

    pub(super) callback: fn(usize),
    pub(super) callback_param: usize,

    /// Whether this slot is currently a member of the timer queue.
    pub(super) linked: bool,

    pub(super) links: HeapLinks,
}

impl PairingHeapNode for TimerCb {
    fn heap_links(&self) -> &HeapLinks {
        &self.links
    }
    fn heap_links_mut(&mut self) -> &mut HeapLinks {
        &mut self.links
    }
}

/// A fixed-capacity timer arena for use in a `static`.
#[doc(hidden)]
pub type StaticArena<const N: usize> = arrayvec::ArrayVec<TimerCb, N>;

/// Convert an [`Interval`] to ticks, validating the range.
///
/// The result is always in `1..=TICKS_MAX_DELTA`.
fn interval_to_ticks<Traits: crate::PortTimer>(
    interval: Interval,
) -> Result<UTicks, BadParamError> {
    let ticks = match interval {
        Interval::Ticks(ticks) => ticks as u64,
        Interval::Millis(ms) => ms as u64 * Traits::TICKS_PER_SECOND as u64 / 1000,
        Interval::Hz(0) => return Err(BadParamError::BadParam),
        Interval::Hz(hz) => (Traits::TICKS_PER_SECOND / hz) as u64,
    };
    if ticks > TICKS_MAX_DELTA as u64 {
        return Err(BadParamError::BadParam);
    }
    // A sub-tick interval fires on the next tick.
    Ok((ticks as UTicks).max(1))
}

/// A handle to a timer slot.
///
/// Slots are allocated by [`Timer::new`] and never freed; dropping the handle
/// leaks the slot but is otherwise harmless.
pub struct Timer<Traits> {
    index: usize,
    _phantom: PhantomData<Traits>,
}

impl<Traits> Clone for Timer<Traits> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Traits> Copy for Timer<Traits> {}

impl<Traits> PartialEq for Timer<Traits> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<Traits> Eq for Timer<Traits> {}

impl<Traits> fmt::Debug for Timer<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Timer").field(&self.index).finish()
    }
}

impl<Traits: SoftTimerTraits> Timer<Traits> {
    /// Allocate a timer slot in a disarmed state.
    ///
    /// `callback` will be passed to the port's callback scheduler along with
    /// `param` whenever the timer expires. It does not run during
    /// [`dispatch`]; it runs wherever the port drains its callback queue.
    ///
    /// [`dispatch`]: crate::dispatch
    pub fn new(
        mode: TimerMode,
        interval: Interval,
        callback: fn(usize),
        param: usize,
    ) -> Result<Self, NewTimerError> {
        let interval = interval_to_ticks::<Traits>(interval)?;
        let mut lock = lock_sched::<Traits>()?;

        let queue = Traits::g().queue.write(&mut *lock);
        if queue.arena.is_full() {
            return Err(NewTimerError::OutOfSlots);
        }
        let index = queue.arena.len();
        queue.arena.push(TimerCb {
            mode,
            interval,
            expiry: 0,
            callback,
            callback_param: param,
            linked: false,
            links: HeapLinks::UNLINKED,
        });

        Ok(Self {
            index,
            _phantom: PhantomData,
        })
    }

    /// Arm the timer to fire one interval from now.
    ///
    /// If the timer is already armed, it's moved to the new expiry.
    pub fn start(self) -> Result<(), StartTimerError> {
        let mut lock = lock_sched::<Traits>()?;
        // Safety: The scheduler lock is held
        let now = unsafe { Traits::tick_count() };
        let interval = Traits::g().queue.read(&*lock).arena[self.index].interval;
        sched::insert(lock.borrow_mut(), self.index, ticks_add(now, interval));
        Ok(())
    }

    /// Arm the timer to fire after `delay` instead of its own interval.
    ///
    /// For a periodic timer this only affects the first firing; subsequent
    /// firings use the timer's interval.
    pub fn start_after(self, delay: Interval) -> Result<(), StartTimerError> {
        let delay = interval_to_ticks::<Traits>(delay)?;
        let mut lock = lock_sched::<Traits>()?;
        // Safety: The scheduler lock is held
        let now = unsafe { Traits::tick_count() };
        sched::insert(lock.borrow_mut(), self.index, ticks_add(now, delay));
        Ok(())
    }

    /// Disarm the timer. No-op if it isn't armed.
    pub fn stop(self) -> Result<(), StopTimerError> {
        let mut lock = lock_sched::<Traits>()?;
        sched::remove(lock.borrow_mut(), self.index);
        Ok(())
    }

    /// Replace the timer's interval.
    ///
    /// An already-armed timer keeps its current expiry; the new interval
    /// takes effect the next time the timer is rescheduled ([`start`] or a
    /// periodic reload).
    ///
    /// [`start`]: Self::start
    pub fn set_interval(self, interval: Interval) -> Result<(), SetIntervalError> {
        let interval = interval_to_ticks::<Traits>(interval)?;
        let mut lock = lock_sched::<Traits>()?;
        Traits::g().queue.write(&mut *lock).arena[self.index].interval = interval;
        Ok(())
    }

    /// Whether the timer is currently armed.
    pub fn is_armed(self) -> Result<bool, QueryTimerError> {
        let mut lock = lock_sched::<Traits>()?;
        Ok(sched::is_linked(lock.borrow_mut(), self.index))
    }
}
