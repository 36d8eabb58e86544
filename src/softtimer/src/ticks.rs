//! Wrap-safe tick arithmetic.
//!
//! Tick counts live in the half-open range `0..TICKS_PERIOD` and wrap around
//! to zero. Two counts are compared by [`ticks_diff`], which maps their
//! distance into `-TICKS_PERIOD/2..TICKS_PERIOD/2`, so an expiry up to
//! [`TICKS_MAX_DELTA`] ticks in the future is unambiguously "later" no matter
//! where the counter currently sits.

/// Unsigned tick count.
pub type UTicks = u32;

/// Signed tick distance, as produced by [`ticks_diff`].
pub type ITicks = i32;

/// The modulus of the tick counter. Must be a power of two.
pub const TICKS_PERIOD: UTicks = 1 << 31;

/// The largest relative delay that can be represented without ambiguity.
pub const TICKS_MAX_DELTA: UTicks = TICKS_PERIOD / 2 - 1;

/// Add a delta to a tick count, wrapping modulo [`TICKS_PERIOD`].
#[inline]
pub const fn ticks_add(t: UTicks, delta: UTicks) -> UTicks {
    t.wrapping_add(delta) & (TICKS_PERIOD - 1)
}

/// The signed distance `t1 - t0`, in `-TICKS_PERIOD/2..TICKS_PERIOD/2`.
///
/// Negative means `t1` is earlier than `t0`.
#[inline]
pub const fn ticks_diff(t1: UTicks, t0: UTicks) -> ITicks {
    // Bias the raw difference by half a period before masking so the result
    // lands in the signed half-period range after the bias is removed.
    ((t1.wrapping_sub(t0).wrapping_add(TICKS_PERIOD / 2) & (TICKS_PERIOD - 1))
        .wrapping_sub(TICKS_PERIOD / 2)) as ITicks
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn diff_basic() {
        assert_eq!(ticks_diff(100, 40), 60);
        assert_eq!(ticks_diff(40, 100), -60);
        assert_eq!(ticks_diff(0, 0), 0);
    }

    #[test]
    fn diff_across_wrap() {
        assert_eq!(ticks_diff(1, TICKS_PERIOD - 1), 2);
        assert_eq!(ticks_diff(TICKS_PERIOD - 1, 1), -2);
        assert_eq!(ticks_diff(0, TICKS_PERIOD - 1), 1);
    }

    #[test]
    fn diff_extremes() {
        assert_eq!(ticks_diff(TICKS_MAX_DELTA, 0), TICKS_MAX_DELTA as ITicks);
        // Exactly half a period away is interpreted as "in the past".
        assert_eq!(
            ticks_diff(TICKS_PERIOD / 2, 0),
            -((TICKS_PERIOD / 2) as ITicks)
        );
    }

    #[test]
    fn add_wraps() {
        assert_eq!(ticks_add(TICKS_PERIOD - 1, 1), 0);
        assert_eq!(ticks_add(TICKS_PERIOD - 1, 2), 1);
        assert_eq!(ticks_add(0, TICKS_MAX_DELTA), TICKS_MAX_DELTA);
    }

    #[quickcheck]
    fn qc_add_then_diff(t: UTicks, delta: UTicks) -> bool {
        let t = t & (TICKS_PERIOD - 1);
        let delta = delta % (TICKS_MAX_DELTA + 1);
        ticks_diff(ticks_add(t, delta), t) == delta as ITicks
    }

    #[quickcheck]
    fn qc_diff_antisymmetric(a: UTicks, b: UTicks) -> bool {
        let a = a & (TICKS_PERIOD - 1);
        let b = b & (TICKS_PERIOD - 1);
        let d = ticks_diff(a, b);
        // The half-period point is its own negation modulo the period.
        if d == -((TICKS_PERIOD / 2) as ITicks) {
            ticks_diff(b, a) == d
        } else {
            ticks_diff(b, a) == -d
        }
    }
}
