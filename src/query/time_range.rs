// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A disjoint, half-open interval set over `i64` timestamps, used as the
//! query reader's `allowed_range`/`index_usable_range`.

use crate::preprocessor::TimeFilter;

/// A sorted, non-overlapping set of `[start, end)` intervals.
///
/// Invariant: `intervals` is sorted by `start` and no two intervals touch
/// or overlap - adjacent ranges are always merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRange {
    intervals: Vec<(i64, i64)>,
}

impl TimeRange {
    /// The empty range.
    #[must_use]
    pub fn empty() -> Self {
        Self { intervals: Vec::new() }
    }

    /// The unbounded range, `(-infinity, +infinity)`.
    #[must_use]
    pub fn full() -> Self {
        Self {
            intervals: vec![(i64::MIN, i64::MAX)],
        }
    }

    /// A single `[start, end)` interval. Empty if `start >= end`.
    #[must_use]
    pub fn single(start: i64, end: i64) -> Self {
        if start >= end {
            Self::empty()
        } else {
            Self {
                intervals: vec![(start, end)],
            }
        }
    }

    /// `true` if this range covers no points at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// `true` if `t` falls within some interval.
    #[must_use]
    pub fn contains_point(&self, t: i64) -> bool {
        self.intervals.iter().any(|&(s, e)| t >= s && t < e)
    }

    /// `true` if `[start, end)` intersects any interval in this range.
    #[must_use]
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.intervals.iter().any(|&(s, e)| s < end && start < e)
    }

    /// The set union of `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut all: Vec<(i64, i64)> = self
            .intervals
            .iter()
            .chain(&other.intervals)
            .copied()
            .collect();
        all.sort_unstable_by_key(|&(s, _)| s);

        let mut merged: Vec<(i64, i64)> = Vec::with_capacity(all.len());
        for (s, e) in all {
            if let Some(last) = merged.last_mut() {
                if s <= last.1 {
                    last.1 = last.1.max(e);
                    continue;
                }
            }
            merged.push((s, e));
        }

        Self { intervals: merged }
    }

    /// The set intersection of `self` and `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < self.intervals.len() && j < other.intervals.len() {
            let (s1, e1) = self.intervals[i];
            let (s2, e2) = other.intervals[j];
            let lo = s1.max(s2);
            let hi = e1.min(e2);
            if lo < hi {
                out.push((lo, hi));
            }
            if e1 < e2 {
                i += 1;
            } else {
                j += 1;
            }
        }

        Self { intervals: out }
    }

    /// The set difference `self \ other`: every point in `self` not
    /// covered by `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = Vec::new();

        for &(mut s, e) in &self.intervals {
            for &(os, oe) in &other.intervals {
                if os >= e || oe <= s {
                    continue;
                }
                if os > s {
                    out.push((s, os));
                }
                s = s.max(oe);
                if s >= e {
                    break;
                }
            }
            if s < e {
                out.push((s, e));
            }
        }

        out.sort_unstable_by_key(|&(s, _)| s);
        Self { intervals: out }
    }

    /// Returns the underlying interval list.
    #[must_use]
    pub fn intervals(&self) -> &[(i64, i64)] {
        &self.intervals
    }
}

impl TimeFilter for TimeRange {
    fn allows(&self, start_time: i64) -> bool {
        self.contains_point(start_time)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn union_merges_overlapping_intervals() {
        let a = TimeRange::single(0, 10);
        let b = TimeRange::single(5, 15);
        let u = a.union(&b);
        assert_eq!(u.intervals(), &[(0, 15)]);
    }

    #[test]
    fn union_keeps_disjoint_intervals_separate() {
        let a = TimeRange::single(0, 5);
        let b = TimeRange::single(10, 15);
        let u = a.union(&b);
        assert_eq!(u.intervals(), &[(0, 5), (10, 15)]);
    }

    #[test]
    fn intersect_finds_overlap() {
        let a = TimeRange::single(0, 10);
        let b = TimeRange::single(5, 20);
        let i = a.intersect(&b);
        assert_eq!(i.intervals(), &[(5, 10)]);
    }

    #[test]
    fn difference_removes_covered_prefix() {
        let a = TimeRange::single(0, 20);
        let b = TimeRange::single(0, 5);
        let d = a.difference(&b);
        assert_eq!(d.intervals(), &[(5, 20)]);
    }

    #[test]
    fn difference_can_split_a_range_in_two() {
        let a = TimeRange::single(0, 20);
        let b = TimeRange::single(5, 10);
        let d = a.difference(&b);
        assert_eq!(d.intervals(), &[(0, 5), (10, 20)]);
    }

    #[test]
    fn allowed_range_never_grows_p4() {
        let initial = TimeRange::full();
        let after_one_prune = initial.difference(&TimeRange::single(0, 100));
        let after_two_prunes = after_one_prune.difference(&TimeRange::single(100, 200));
        // every point allowed after the second prune was already allowed after the first
        for &(s, e) in after_two_prunes.intervals() {
            assert!(after_one_prune.overlaps(s, e) || s == e);
        }
    }
}
