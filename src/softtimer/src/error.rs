//! Error types returned by the timer API.

/// Internal error type produced when an operation is attempted while the
/// scheduler lock is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BadContextError {
    BadContext,
}

/// Internal error type produced by interval validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BadParamError {
    BadParam,
}

macro_rules! impl_from_suberror {
    ($target:ty { $($sub:ty => $variant:ident),* $(,)* }) => {
        $(
            impl From<$sub> for $target {
                fn from(_: $sub) -> Self {
                    Self::$variant
                }
            }
        )*
    };
}

/// Error type for [`Timer::new`](crate::Timer::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewTimerError {
    /// The scheduler lock could not be acquired.
    BadContext,
    /// The interval is out of range.
    BadParam,
    /// All timer slots are in use.
    OutOfSlots,
}

impl_from_suberror!(NewTimerError {
    BadContextError => BadContext,
    BadParamError => BadParam,
});

/// Error type for [`Timer::start`](crate::Timer::start) and
/// [`Timer::start_after`](crate::Timer::start_after).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTimerError {
    /// The scheduler lock could not be acquired.
    BadContext,
    /// The delay is out of range.
    BadParam,
}

impl_from_suberror!(StartTimerError {
    BadContextError => BadContext,
    BadParamError => BadParam,
});

/// Error type for [`Timer::stop`](crate::Timer::stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTimerError {
    /// The scheduler lock could not be acquired.
    BadContext,
}

impl_from_suberror!(StopTimerError {
    BadContextError => BadContext,
});

/// Error type for [`Timer::set_interval`](crate::Timer::set_interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetIntervalError {
    /// The scheduler lock could not be acquired.
    BadContext,
    /// The interval is out of range.
    BadParam,
}

impl_from_suberror!(SetIntervalError {
    BadContextError => BadContext,
    BadParamError => BadParam,
});

/// Error type for [`Timer::is_armed`](crate::Timer::is_armed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTimerError {
    /// The scheduler lock could not be acquired.
    BadContext,
}

impl_from_suberror!(QueryTimerError {
    BadContextError => BadContext,
});

/// Error type for [`deinit`](crate::deinit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeinitError {
    /// The scheduler lock could not be acquired.
    BadContext,
}

impl_from_suberror!(DeinitError {
    BadContextError => BadContext,
});
