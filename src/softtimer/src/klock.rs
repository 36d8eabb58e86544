//! Timer state locking mechanism
//!
//! All mutable engine state lives in [`SchedLockCell`]s, which can only be
//! accessed while the port's scheduler lock is held. The lock is modeled as a
//! zero-sized singleton token, so the borrow checker statically proves that
//! the state is never touched outside the lock.
use core::{fmt, ops};
use tokenlock::UnsyncTokenLock;

use crate::{error::BadContextError, utils::Init, PortThreading};

pub(super) struct SchedLockTag<Traits>(Traits);

/// The key that "unlocks" [`SchedLockCell`].
pub(super) type SchedLockToken<Traits> = tokenlock::UnsyncSingletonToken<SchedLockTag<Traits>>;

/// The keyhole type for [`UnsyncTokenLock`] that can be "unlocked" by
/// [`SchedLockToken`].
pub(super) type SchedLockKeyhole<Traits> = tokenlock::SingletonTokenId<SchedLockTag<Traits>>;

/// Cell type that can be accessed by [`SchedLockToken`] (which can be obtained
/// by [`lock_sched`]).
pub(super) struct SchedLockCell<Traits, T: ?Sized>(UnsyncTokenLock<T, SchedLockKeyhole<Traits>>);

impl<Traits: PortThreading, T: fmt::Debug> fmt::Debug for SchedLockCell<Traits, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Formatting needs the lock. If it's already held, the contents are
        // being mutated somewhere up the call stack.
        if let Ok(lock) = lock_sched::<Traits>() {
            f.write_str("SchedLockCell(")?;
            self.0.read(&*lock).fmt(f)?;
            f.write_str(")")
        } else {
            f.write_str("SchedLockCell(< locked >)")
        }
    }
}

impl<Traits, T: Init> Init for SchedLockCell<Traits, T> {
    const INIT: Self = Self(Init::INIT);
}

impl<Traits, T> ops::Deref for SchedLockCell<Traits, T> {
    type Target = UnsyncTokenLock<T, SchedLockKeyhole<Traits>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<Traits, T> ops::DerefMut for SchedLockCell<Traits, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Attempt to acquire the scheduler lock and get an RAII guard.
/// Return `BadContext` if the lock is already held.
pub(super) fn lock_sched<Traits: PortThreading>() -> Result<SchedLockGuard<Traits>, BadContextError>
{
    // Safety: `try_enter_sched_lock` is only meant to be called by the engine
    if unsafe { Traits::try_enter_sched_lock() } {
        // Safety: We just acquired the lock. This also means there are no
        //         instances of `SchedLockGuard` existing at this point.
        Ok(unsafe { assume_sched_lock() })
    } else {
        Err(BadContextError::BadContext)
    }
}

/// Assume the scheduler lock is held and get `SchedLockGuard`.
///
/// # Safety
///
/// The lock must really be held. There must be no instances of
/// `SchedLockGuard` existing at the point of the call.
pub(super) unsafe fn assume_sched_lock<Traits: PortThreading>() -> SchedLockGuard<Traits> {
    debug_assert!(Traits::is_sched_lock_active());

    SchedLockGuard {
        // Safety: There are no other instances of `SchedLockToken`; this is
        //         upheld by the caller.
        token: unsafe { SchedLockToken::new_unchecked() },
    }
}

/// RAII guard for the scheduler lock.
///
/// [`SchedLockToken`] can be borrowed from this type.
pub(super) struct SchedLockGuard<Traits: PortThreading> {
    token: SchedLockToken<Traits>,
}

impl<Traits: PortThreading> SchedLockGuard<Traits> {
    /// Construct a [`SchedLockTokenRefMut`] by borrowing `self`.
    pub(super) fn borrow_mut(&mut self) -> SchedLockTokenRefMut<'_, Traits> {
        self.token.borrow_mut()
    }
}

impl<Traits: PortThreading> Drop for SchedLockGuard<Traits> {
    fn drop(&mut self) {
        // Safety: The lock is currently held, and it's us (the engine) who
        // are currently controlling it
        unsafe {
            Traits::leave_sched_lock();
        }
    }
}

impl<Traits: PortThreading> ops::Deref for SchedLockGuard<Traits> {
    type Target = SchedLockToken<Traits>;
    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl<Traits: PortThreading> ops::DerefMut for SchedLockGuard<Traits> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}

/// Borrowed version of [`SchedLockGuard`]. This is equivalent to
/// `&'a mut SchedLockGuard` but does not consume memory.
///
/// When you pass `&'a mut _` to a function, the compiler automatically
/// reborrows it so that the original remains accessible after the call. This
/// does not happen with `SchedLockTokenRefMut`; call [`borrow_mut`] manually.
///
/// [`borrow_mut`]: tokenlock::UnsyncSingletonTokenRefMut::borrow_mut
pub(super) type SchedLockTokenRefMut<'a, Traits> =
    tokenlock::UnsyncSingletonTokenRefMut<'a, SchedLockTag<Traits>>;
