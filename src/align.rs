// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Uniform time-resampling of a window into its L2 "aligned" form.

use crate::binary_search::partition_point;

/// Resamples `(times, values)` onto `n` equally spaced grid points between
/// `times[0]` and `times[times.len() - 1]`, taking the nearest-neighbour
/// source value by timestamp at each grid point.
///
/// Ties (a grid point equidistant from two source samples) keep the later
/// candidate, matching "keep scanning while the next candidate is strictly
/// closer", not "first closer candidate wins".
///
/// `times` must be sorted ascending and non-empty; `times.len() == values.len()`.
#[must_use]
pub fn align_uniform(times: &[i64], values: &[f64], n: usize) -> Vec<f64> {
    debug_assert_eq!(times.len(), values.len());
    debug_assert!(!times.is_empty());

    if n == 0 {
        return Vec::new();
    }

    let Some(&t0) = times.first() else {
        return Vec::new();
    };
    let Some(&t_last) = times.last() else {
        return Vec::new();
    };

    if n == 1 || t_last == t0 {
        return vec![values.first().copied().unwrap_or(0.0); n];
    }

    #[allow(clippy::cast_precision_loss)]
    let delta = (t_last - t0) as f64 / (n - 1) as f64;

    let mut out = Vec::with_capacity(n);

    for k in 0..n {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let grid_time = t0 + (k as f64 * delta).round() as i64;

        // First source index whose timestamp is >= grid_time.
        let idx = partition_point(times, |&t| t < grid_time);

        let chosen = nearest_from_candidate(times, idx, grid_time);
        out.push(values.get(chosen).copied().unwrap_or(0.0));
    }

    out
}

/// Given `idx` (the first index with `times[idx] >= grid_time`), walks
/// forward while the next candidate is strictly closer, then picks between
/// `idx` and `idx - 1` by distance (ties favor the later one).
fn nearest_from_candidate(times: &[i64], idx: usize, grid_time: i64) -> usize {
    let mut best = idx.min(times.len().saturating_sub(1));

    loop {
        let next = best + 1;
        let Some(&next_t) = times.get(next) else {
            break;
        };
        let Some(&best_t) = times.get(best) else {
            break;
        };
        if (next_t - grid_time).abs() < (best_t - grid_time).abs() {
            best = next;
        } else {
            break;
        }
    }

    if best == 0 {
        return best;
    }

    if let (Some(&best_t), Some(&prev_t)) = (times.get(best), times.get(best - 1)) {
        if (prev_t - grid_time).abs() < (best_t - grid_time).abs() {
            return best - 1;
        }
    }

    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn aligns_to_requested_length() {
        let times = [0, 10, 20, 30];
        let values = [1.0, 2.0, 3.0, 4.0];
        let aligned = align_uniform(&times, &values, 4);
        assert_eq!(aligned.len(), 4);
        assert_eq!(aligned, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn nearest_neighbour_for_finer_grid() {
        let times = [0, 10];
        let values = [0.0, 100.0];
        // grid: 0, 2, 4, 6, 8, 10 -> nearest of {0,10}
        let aligned = align_uniform(&times, &values, 6);
        assert_eq!(aligned.len(), 6);
        assert_eq!(aligned.first(), Some(&0.0));
        assert_eq!(aligned.last(), Some(&100.0));
    }

    #[test]
    fn idempotent_under_same_n() {
        let times = [0, 5, 9, 14, 20];
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let once = align_uniform(&times, &values, 5);
        let twice = align_uniform(&times, &once.clone(), once.len());
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn single_point_window_repeats_value() {
        let times = [5];
        let values = [42.0];
        let aligned = align_uniform(&times, &values, 3);
        assert_eq!(aligned, vec![42.0, 42.0, 42.0]);
    }
}
