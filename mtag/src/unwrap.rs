//! Time unwrapping: repairs a 32-bit microsecond counter that wraps at
//! `2^32` and tolerates mild out-of-order writes that straddle a wrap
//! boundary.
//!
//! Ported from the reference deserializer's `unwrapper`, which operates on
//! a numpy array in place; here the same three passes (flag positive
//! jumps, correct the straddling run, flag and apply genuine wraps) run
//! over an owned `Vec<i64>` so intermediate values can go negative.

/// Largest representable microsecond counter before it wraps to zero.
pub const MAX_TIME: i64 = (1i64 << 32) - 1;

/// Default fraction of [`MAX_TIME`] used to classify a consecutive
/// difference as a wrap rather than ordinary jitter.
pub const DEFAULT_BAD_FRAC: f64 = 0.5;

/// Unwrap a sequence of raw 32-bit microsecond counters using the real
/// wrap boundary and default threshold fraction.
pub fn unwrap_times(values: &[u32]) -> (Vec<i64>, usize) {
    let items: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    unwrap(&items, MAX_TIME, DEFAULT_BAD_FRAC)
}

/// Generalised unwrap over arbitrary signed values and wrap boundary.
///
/// `n < 2` returns the input unchanged with zero overflows. Otherwise:
///
/// 1. flag positive jumps `>= bad_frac * max_time` (an out-of-order write
///    around a wrap);
/// 2. for each, subtract `max_time` from the run up to the matching
///    negative jump that follows it; if no matching negative jump is
///    found before the end of the sequence, that run is left untouched
///    (the positive jump wasn't a reordering around a wrap after all);
/// 3. recompute negative jumps `<= -bad_frac * max_time` on the adjusted
///    sequence — these are the genuine wraps;
/// 4. add `max_time` to everything after each genuine wrap.
///
/// Returns the adjusted sequence and the number of genuine wraps found.
pub fn unwrap(values: &[i64], max_time: i64, bad_frac: f64) -> (Vec<i64>, usize) {
    let n = values.len();
    if n < 2 {
        return (values.to_vec(), 0);
    }

    let threshold = bad_frac * max_time as f64;
    let mut items = values.to_vec();

    let diff = |items: &[i64], i: usize| items[i + 1] - items[i];

    let positive_jumps: Vec<usize> = (0..n - 1)
        .filter(|&i| diff(&items, i) as f64 >= threshold)
        .collect();

    for i in positive_jumps {
        let start = i + 1;
        let mut matching_end = None;
        for j in start..n - 1 {
            if diff(&items, j) as f64 <= -threshold {
                matching_end = Some(j + 1);
                break;
            }
        }
        if let Some(end) = matching_end {
            for v in items.iter_mut().take(end).skip(start) {
                *v -= max_time;
            }
        }
    }

    let negative_jumps: Vec<usize> = (0..n - 1)
        .filter(|&i| diff(&items, i) as f64 <= -threshold)
        .collect();

    for i in &negative_jumps {
        for v in items.iter_mut().skip(i + 1) {
            *v += max_time;
        }
    }

    (items, negative_jumps.len())
}
