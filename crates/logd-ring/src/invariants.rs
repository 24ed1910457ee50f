//! Debug assertion macros for the overwrite ring.
//!
//! Active only in debug builds, zero overhead in release.

/// Assert that a monotonic write counter only increases.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Detect an implausible jump in the write counter (not ordinary wraparound,
/// which at realistic write rates would take centuries).
macro_rules! debug_assert_no_wrap {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new > $old || $old.wrapping_sub($new) > (1u64 << 32),
            "potential wrap detected: {} went from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_wrap;
