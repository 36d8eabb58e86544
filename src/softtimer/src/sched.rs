//! Timer queue management and expiry dispatch.
//!
//! All outstanding timers live in a single pairing heap keyed by expiry tick.
//! The engine publishes the earliest expiry to the port ([`PortTimer`]), and
//! the port calls [`dispatch`] back when that tick arrives. `dispatch` never
//! runs user callbacks itself; it hands them to
//! [`PortCallback::schedule_callback`] so they execute outside the scheduler
//! lock.
//!
//! [`PortTimer`]: crate::PortTimer
//! [`PortCallback::schedule_callback`]: crate::PortCallback::schedule_callback
use core::fmt;

use crate::{
    error::DeinitError,
    klock::{self, SchedLockCell, SchedLockTokenRefMut},
    ticks::{ticks_add, ticks_diff, UTicks},
    timer::{TimerCb, TimerMode},
    utils::{
        pairing_heap::{PairingHeap, PairingHeapCtx, NONE},
        Init, VecLike,
    },
    SoftTimerTraits,
};

/// The engine-global state of one engine instance.
///
/// Exactly one `static` of this type exists per traits type; it's instantiated
/// by the port's `use_port!` macro and returned by
/// [`SoftTimerTraits::state`].
pub struct State<Traits, Arena: 'static> {
    pub(super) timer: TimerGlobals<Traits, Arena>,
}

impl<Traits, Arena: VecLike + 'static> State<Traits, Arena> {
    pub const INIT: Self = Self {
        timer: Init::INIT,
    };
}

impl<Traits: SoftTimerTraits, Arena: fmt::Debug + 'static> fmt::Debug for State<Traits, Arena> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("State").field("timer", &self.timer).finish()
    }
}

/// An engine-global state for timer management.
pub(super) struct TimerGlobals<Traits, Arena: 'static> {
    /// The pairing heap containing armed timers, keyed by expiry tick, plus
    /// the arena slots backing it.
    pub(super) queue: SchedLockCell<Traits, TimerQueue<Arena>>,

    /// The expiry most recently published to the port with
    /// [`pend_dispatch_at`], or `None` if dispatch is suppressed.
    ///
    /// [`pend_dispatch_at`]: crate::PortTimer::pend_dispatch_at
    next_wake: SchedLockCell<Traits, Option<UTicks>>,
}

pub(super) struct TimerQueue<Arena> {
    /// Timer slots. A slot is allocated on [`Timer::new`] and never freed.
    ///
    /// [`Timer::new`]: crate::Timer::new
    pub(super) arena: Arena,

    /// The root of the pairing heap, or [`NONE`] if no timer is armed.
    pub(super) root: usize,
}

impl<Arena: VecLike> Init for TimerQueue<Arena> {
    const INIT: Self = Self {
        arena: Arena::DEFAULT,
        root: NONE,
    };
}

impl<Arena: fmt::Debug> fmt::Debug for TimerQueue<Arena> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("arena", &self.arena)
            .field("root", &self.root)
            .finish()
    }
}

impl<Traits, Arena: VecLike + 'static> Init for TimerGlobals<Traits, Arena> {
    const INIT: Self = Self {
        queue: Init::INIT,
        next_wake: Init::INIT,
    };
}

impl<Traits: SoftTimerTraits, Arena: fmt::Debug> fmt::Debug for TimerGlobals<Traits, Arena> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimerGlobals")
            .field("queue", &self.queue)
            .field("next_wake", &self.next_wake)
            .finish()
    }
}

/// An internal utility to access `TimerGlobals`.
pub(super) trait TimerGlobalsExt: SoftTimerTraits {
    fn g() -> &'static TimerGlobals<Self, Self::TimerArena>;
}

impl<T: SoftTimerTraits> TimerGlobalsExt for T {
    /// Shortcut for `&Self::state().timer`.
    #[inline(always)]
    fn g() -> &'static TimerGlobals<Self, Self::TimerArena> {
        &Self::state().timer
    }
}

/// Orders timer slots by expiry tick, earlier first.
///
/// The comparison is wrap-safe as long as all armed expiries lie within
/// [`TICKS_MAX_DELTA`] of the current tick count, which the public API
/// enforces at arming time.
///
/// [`TICKS_MAX_DELTA`]: crate::ticks::TICKS_MAX_DELTA
struct ExpiryOrder;

impl PairingHeapCtx<TimerCb> for ExpiryOrder {
    #[inline]
    fn lt(&mut self, x: &TimerCb, y: &TimerCb) -> bool {
        ticks_diff(x.expiry, y.expiry) < 0
    }
}

/// Arm the timer in slot `index` to expire at `expiry`.
///
/// If the slot is already linked into the queue, it's moved to the new expiry
/// (re-arming is idempotent). The new earliest expiry is published to the
/// port before returning.
pub(super) fn insert<Traits: SoftTimerTraits>(
    mut lock: SchedLockTokenRefMut<'_, Traits>,
    index: usize,
    expiry: UTicks,
) {
    let g = Traits::g();
    {
        let queue = g.queue.write(&mut *lock);
        if queue.arena[index].linked {
            queue.root = queue.arena.heap_remove(queue.root, index, ExpiryOrder);
        }
        queue.arena[index].expiry = expiry;
        queue.root = queue.arena.heap_push(queue.root, index, ExpiryOrder);
        queue.arena[index].linked = true;
    }

    pend_next_wake(lock);
}

/// Disarm the timer in slot `index`. No-op if it isn't armed.
///
/// A wake-up already published for this timer is deliberately left in place.
/// The resulting dispatch finds nothing due and republishes the correct next
/// expiry, which is cheaper than retracting the wake-up eagerly on a path
/// that may run in interrupt context.
pub(super) fn remove<Traits: SoftTimerTraits>(
    mut lock: SchedLockTokenRefMut<'_, Traits>,
    index: usize,
) {
    let queue = Traits::g().queue.write(&mut *lock);
    if queue.arena[index].linked {
        queue.root = queue.arena.heap_remove(queue.root, index, ExpiryOrder);
        queue.arena[index].linked = false;
    }
}

/// Publish the earliest outstanding expiry to the port, or suppress dispatch
/// if the queue is empty.
pub(super) fn pend_next_wake<Traits: SoftTimerTraits>(mut lock: SchedLockTokenRefMut<'_, Traits>) {
    let g = Traits::g();
    let root = g.queue.read(&*lock).root;
    if root == NONE {
        g.next_wake.replace(&mut *lock, None);
        // Safety: The scheduler lock is held
        unsafe { Traits::suppress_dispatch() };
    } else {
        let expiry = g.queue.read(&*lock).arena[root].expiry;
        g.next_wake.replace(&mut *lock, Some(expiry));
        // Safety: The scheduler lock is held
        unsafe { Traits::pend_dispatch_at(expiry) };
    }
}

/// Process all timers that are due at the current tick count.
///
/// The port calls this when the tick count reaches a previously published
/// wake-up. Spurious calls are harmless. For each due timer, the callback is
/// handed to [`schedule_callback`]; one-shot timers are disarmed and periodic
/// timers are rescheduled at `old_expiry + interval` (not `now + interval`, so
/// the period doesn't accumulate dispatch latency). A periodic timer whose
/// rescheduled expiry is still due fires again in the same pass, producing a
/// catch-up burst after a stall.
///
/// The tick count is sampled exactly once, so timers armed at `now + delta`
/// by a concurrent re-arm can't extend the pass indefinitely.
///
/// [`schedule_callback`]: crate::PortCallback::schedule_callback
///
/// # Safety
///
/// This must not be called from a context where the scheduler lock is held.
pub unsafe fn dispatch<Traits: SoftTimerTraits>() {
    let mut lock = match klock::lock_sched::<Traits>() {
        Ok(lock) => lock,
        Err(_) => {
            // The port pended a dispatch from within a dispatch pass. The
            // republished wake-up will cover any timers we'd miss here.
            return;
        }
    };
    let g = Traits::g();

    // Safety: The scheduler lock is held
    let now = unsafe { Traits::tick_count() };

    loop {
        let queue = g.queue.write(&mut *lock);
        let root = queue.root;
        if root == NONE || ticks_diff(queue.arena[root].expiry, now) > 0 {
            break;
        }

        let (_, new_root) = queue.arena.heap_pop(root, ExpiryOrder);
        queue.root = new_root;

        let cb = queue.arena[root];
        match cb.mode {
            TimerMode::OneShot => {
                queue.arena[root].linked = false;
            }
            TimerMode::Periodic => {
                queue.arena[root].expiry = ticks_add(cb.expiry, cb.interval);
                queue.root = queue.arena.heap_push(queue.root, root, ExpiryOrder);
            }
        }

        Traits::schedule_callback(cb.callback, cb.callback_param);
    }

    pend_next_wake(lock.borrow_mut());
}

/// Disarm every timer and suppress the pending wake-up, if any.
///
/// Timer handles remain valid; their slots can be re-armed later.
pub fn deinit<Traits: SoftTimerTraits>() -> Result<(), DeinitError> {
    let mut lock = klock::lock_sched::<Traits>()?;
    let g = Traits::g();
    {
        let queue = g.queue.write(&mut *lock);
        while queue.root != NONE {
            let (popped, new_root) = queue.arena.heap_pop(queue.root, ExpiryOrder);
            queue.root = new_root;
            if let Some(i) = popped {
                queue.arena[i].linked = false;
            }
        }
    }
    g.next_wake.replace(&mut *lock, None);
    // Safety: The scheduler lock is held
    unsafe { Traits::suppress_dispatch() };
    Ok(())
}

/// Whether the timer in slot `index` is currently armed.
pub(super) fn is_linked<Traits: SoftTimerTraits>(
    lock: SchedLockTokenRefMut<'_, Traits>,
    index: usize,
) -> bool {
    Traits::g().queue.read(&*lock).arena[index].linked
}
