// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Node-split strategies: seed picking plus the group
//! distribution that follows it.

use super::mbr::Mbr;
use crate::error::{Error, Result};

/// Which seed-picking algorithm a [`super::RTree`] uses when a node
/// overflows `max_entries`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeedPicker {
    /// Guttman's linear-cost seed selection: for each dimension, the pair
    /// maximizing normalized separation; O(entries).
    Linear,
    /// Guttman's quadratic-cost seed selection: the pair maximizing
    /// wasted area over all pairs; O(entries^2), tighter splits.
    Quadratic,
}

impl SeedPicker {
    /// Parses the `seed_picker` configuration key. Defaults to
    /// `LINEAR`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "LINEAR" => Ok(Self::Linear),
            "QUADRATIC" => Ok(Self::Quadratic),
            other => Err(Error::Config(format!("unknown seed_picker {other}"))),
        }
    }
}

impl Default for SeedPicker {
    fn default() -> Self {
        Self::Linear
    }
}

/// Splits `entries` into two non-empty groups, each of size at least
/// `min_entries` (when the total allows it), using `seed_picker` to choose
/// the initial pair and a preference-maximizing pass to place the rest.
pub fn split_entries<E>(
    entries: Vec<E>,
    mbr_of: impl Fn(&E) -> &Mbr,
    seed_picker: SeedPicker,
    min_entries: usize,
) -> (Vec<E>, Vec<E>) {
    let n = entries.len();
    debug_assert!(n >= 2);

    let (seed_a, seed_b) = match seed_picker {
        SeedPicker::Linear => linear_seeds(&entries, &mbr_of),
        SeedPicker::Quadratic => quadratic_seeds(&entries, &mbr_of),
    };

    let mut slots: Vec<Option<E>> = entries.into_iter().map(Some).collect();
    #[allow(clippy::expect_used)]
    let seed_entry_a = slots.get_mut(seed_a).and_then(Option::take).expect("seed_a in range");
    #[allow(clippy::expect_used)]
    let seed_entry_b = slots.get_mut(seed_b).and_then(Option::take).expect("seed_b in range");
    let mut remaining: Vec<E> = slots.into_iter().flatten().collect();

    let mut mbr_a = mbr_of(&seed_entry_a).clone();
    let mut mbr_b = mbr_of(&seed_entry_b).clone();
    let mut group_a: Vec<E> = vec![seed_entry_a];
    let mut group_b: Vec<E> = vec![seed_entry_b];

    while !remaining.is_empty() {
        let remaining_after_a = group_a.len() + remaining.len();
        let remaining_after_b = group_b.len() + remaining.len();

        if group_a.len() < min_entries && remaining_after_a == min_entries {
            group_a.extend(remaining.drain(..));
            break;
        }
        if group_b.len() < min_entries && remaining_after_b == min_entries {
            group_b.extend(remaining.drain(..));
            break;
        }

        let mut best_idx = 0;
        let mut best_preference = f64::NEG_INFINITY;
        let mut best_to_a = true;

        for (pos, e) in remaining.iter().enumerate() {
            let m = mbr_of(e);
            let enlarge_a = mbr_a.enlargement(m);
            let enlarge_b = mbr_b.enlargement(m);
            let preference = (enlarge_a - enlarge_b).abs();

            if preference > best_preference {
                let area_if_a = mbr_a.combine(m).area();
                let area_if_b = mbr_b.combine(m).area();
                best_preference = preference;
                best_idx = pos;
                best_to_a = if enlarge_a < enlarge_b {
                    true
                } else if enlarge_b < enlarge_a {
                    false
                } else if area_if_a != area_if_b {
                    area_if_a < area_if_b
                } else {
                    group_a.len() <= group_b.len()
                };
            }
        }

        let chosen = remaining.remove(best_idx);
        let m = mbr_of(&chosen);
        if best_to_a {
            mbr_a = mbr_a.combine(m);
            group_a.push(chosen);
        } else {
            mbr_b = mbr_b.combine(m);
            group_b.push(chosen);
        }
    }

    (group_a, group_b)
}

/// Guttman's linear seed selection. Returns the two entries' indices into
/// `entries`.
fn linear_seeds<E>(entries: &[E], mbr_of: &impl Fn(&E) -> &Mbr) -> (usize, usize) {
    #[allow(clippy::expect_used)]
    let first = entries.first().expect("at least 2 entries to split");
    let dim = mbr_of(first).dim();
    let mut best_dim_norm = f64::NEG_INFINITY;
    let mut best_pair = (0, usize::from(entries.len() > 1));

    for d in 0..dim {
        let mut max_lowest = f32::NEG_INFINITY;
        let mut max_lowest_idx = 0;
        let mut min_highest = f32::INFINITY;
        let mut min_highest_idx = 0;
        let mut max_highest = f32::NEG_INFINITY;
        let mut min_lowest = f32::INFINITY;

        for (i, e) in entries.iter().enumerate() {
            let m = mbr_of(e);
            let lo = *m.min.get(d).unwrap_or(&0.0);
            let hi = *m.max.get(d).unwrap_or(&0.0);
            if lo > max_lowest {
                max_lowest = lo;
                max_lowest_idx = i;
            }
            if hi < min_highest {
                min_highest = hi;
                min_highest_idx = i;
            }
            max_highest = max_highest.max(hi);
            min_lowest = min_lowest.min(lo);
        }

        let extent = f64::from(max_highest - min_lowest);
        let separation = f64::from(max_lowest - min_highest);
        let normalized = if extent > 0.0 { separation / extent } else { separation };

        if normalized > best_dim_norm {
            best_dim_norm = normalized;
            best_pair = if max_lowest_idx != min_highest_idx {
                (max_lowest_idx, min_highest_idx)
            } else {
                // Degenerate: same entry is both extremes on this
                // dimension. Pair it with any other entry instead.
                let other = (0..entries.len()).find(|&i| i != max_lowest_idx).unwrap_or(0);
                (max_lowest_idx, other)
            };
        }
    }

    best_pair
}

/// Guttman's quadratic seed selection: the pair with the most wasted area
/// if combined, i.e. `area(combine(i, j)) - area(i) - area(j)`.
fn quadratic_seeds<E>(entries: &[E], mbr_of: &impl Fn(&E) -> &Mbr) -> (usize, usize) {
    let mut best = (0, usize::from(entries.len() > 1));
    let mut best_waste = f64::NEG_INFINITY;

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            #[allow(clippy::indexing_slicing)]
            let mi = mbr_of(&entries[i]);
            #[allow(clippy::indexing_slicing)]
            let mj = mbr_of(&entries[j]);
            let waste = mi.combine(mj).area() - mi.area() - mj.area();
            if waste > best_waste {
                best_waste = waste;
                best = (i, j);
            }
        }
    }

    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rtree::node::LeafEntry;

    fn entry(min: [f32; 1], max: [f32; 1]) -> LeafEntry<u32> {
        LeafEntry {
            mbr: Mbr::new(&min, &max),
            payload: 0,
        }
    }

    #[test]
    fn linear_seeds_pick_most_separated_pair() {
        let entries = vec![
            entry([0.0], [1.0]),
            entry([10.0], [11.0]),
            entry([0.5], [0.9]),
        ];
        let (a, b) = linear_seeds(&entries, &|e: &LeafEntry<u32>| &e.mbr);
        let mut pair = [a, b];
        pair.sort_unstable();
        assert_eq!(pair, [0, 1]);
    }

    #[test]
    fn split_respects_min_entries() {
        let entries: Vec<LeafEntry<u32>> = vec![
            entry([0.0], [1.0]),
            entry([1.0], [2.0]),
            entry([2.0], [3.0]),
            entry([100.0], [101.0]),
        ];
        let (a, b) = split_entries(entries, |e| &e.mbr, SeedPicker::Linear, 2);
        assert!(a.len() >= 2);
        assert!(b.len() >= 2);
        assert_eq!(a.len() + b.len(), 4);
    }

    #[test]
    fn quadratic_seeds_maximize_waste() {
        let entries = vec![entry([0.0], [1.0]), entry([1.0], [2.0]), entry([50.0], [60.0])];
        let (a, b) = quadratic_seeds(&entries, &|e: &LeafEntry<u32>| &e.mbr);
        let mut pair = [a, b];
        pair.sort_unstable();
        assert!(pair.contains(&2));
    }
}
