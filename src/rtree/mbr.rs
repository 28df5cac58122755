// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The minimum bounding rectangle used throughout the R-tree.
//!
//! An MBR is a pair of `feature_dim`-length vectors, `min` and `max`, with
//! `min[d] <= max[d]` for every dimension. A point is a zero-volume MBR.

/// An axis-aligned bounding rectangle in feature space.
#[derive(Clone, Debug, PartialEq)]
pub struct Mbr {
    /// Per-dimension lower bound.
    pub min: Vec<f32>,
    /// Per-dimension upper bound.
    pub max: Vec<f32>,
}

impl Mbr {
    /// Builds an MBR from explicit bounds. Panics in debug builds if any
    /// `min[d] > max[d]`; callers are expected to normalize first.
    #[must_use]
    pub fn new(min: &[f32], max: &[f32]) -> Self {
        debug_assert_eq!(min.len(), max.len());
        debug_assert!(min.iter().zip(max).all(|(a, b)| a <= b));
        Self {
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }

    /// A zero-volume MBR at a single point.
    #[must_use]
    pub fn from_point(point: &[f32]) -> Self {
        Self {
            min: point.to_vec(),
            max: point.to_vec(),
        }
    }

    /// A point's MBR expanded by `range` on every side.
    #[must_use]
    pub fn from_point_range(point: &[f32], range: f32) -> Self {
        let min = point.iter().map(|&v| v - range).collect();
        let max = point.iter().map(|&v| v + range).collect();
        Self { min, max }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    /// The rectangle's hypervolume. Degenerate (zero-width) dimensions
    /// contribute a factor of `1.0` rather than collapsing the whole
    /// product to zero, so point MBRs can still be compared by enlargement.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| f64::from(hi - lo).max(0.0))
            .map(|extent| if extent == 0.0 { 1.0 } else { extent })
            .product()
    }

    /// The smallest MBR containing both `self` and `other`.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        debug_assert_eq!(self.dim(), other.dim());
        let min = self.min.iter().zip(&other.min).map(|(&a, &b)| a.min(b)).collect();
        let max = self.max.iter().zip(&other.max).map(|(&a, &b)| a.max(b)).collect();
        Self { min, max }
    }

    /// `area(self.combine(other)) - area(self)`: the cost of absorbing
    /// `other` into `self`.
    #[must_use]
    pub fn enlargement(&self, other: &Self) -> f64 {
        self.combine(other).area() - self.area()
    }

    /// `true` if `self` fully contains `other` on every dimension.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min
            .iter()
            .zip(&other.min)
            .all(|(&a, &b)| a <= b)
            && self.max.iter().zip(&other.max).all(|(&a, &b)| a >= b)
    }

    /// Squared distance from `point` to the nearest point of this
    /// rectangle; `0.0` if `point` lies within the rectangle on every
    /// dimension (the lower-bounding MINDIST formula).
    #[must_use]
    pub fn min_distance_sq(&self, point: &[f32]) -> f64 {
        debug_assert_eq!(self.dim(), point.len());
        self.min
            .iter()
            .zip(&self.max)
            .zip(point)
            .map(|((&lo, &hi), &p)| {
                let gap = if p < lo {
                    lo - p
                } else if p > hi {
                    p - hi
                } else {
                    0.0
                };
                f64::from(gap) * f64::from(gap)
            })
            .sum()
    }

    /// Squared distance from `self` to `other`: `0.0` if the rectangles
    /// overlap or touch on every dimension.
    #[must_use]
    pub fn min_distance_sq_to(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.dim(), other.dim());
        self.min
            .iter()
            .zip(&self.max)
            .zip(other.min.iter().zip(&other.max))
            .map(|((&lo, &hi), (&olo, &ohi))| {
                let gap = if ohi < lo {
                    lo - ohi
                } else if olo > hi {
                    olo - hi
                } else {
                    0.0
                };
                f64::from(gap) * f64::from(gap)
            })
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_the_tight_bound() {
        let a = Mbr::new(&[0.0, 0.0], &[1.0, 1.0]);
        let b = Mbr::new(&[2.0, -1.0], &[3.0, 0.5]);
        let c = a.combine(&b);
        assert_eq!(c.min, vec![0.0, -1.0]);
        assert_eq!(c.max, vec![3.0, 1.0]);
    }

    #[test]
    fn point_inside_has_zero_min_distance() {
        let r = Mbr::new(&[0.0, 0.0], &[10.0, 10.0]);
        assert_eq!(r.min_distance_sq(&[5.0, 5.0]), 0.0);
    }

    #[test]
    fn point_outside_has_positive_min_distance() {
        let r = Mbr::new(&[0.0, 0.0], &[10.0, 10.0]);
        let d = r.min_distance_sq(&[13.0, 0.0]);
        assert_eq!(d, 9.0);
    }

    #[test]
    fn enlargement_is_zero_for_contained_rect() {
        let outer = Mbr::new(&[0.0, 0.0], &[10.0, 10.0]);
        let inner = Mbr::new(&[1.0, 1.0], &[2.0, 2.0]);
        assert_eq!(outer.enlargement(&inner), 0.0);
        assert!(outer.contains(&inner));
    }
}
