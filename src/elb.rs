// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Equal-Length Block feature extractor.
//!
//! For a window of length `W` divided into `b` equal-length blocks (the
//! last block absorbs any remainder), this produces `b` `(upper, lower)`
//! pairs that form an MBR in feature space, laid out on disk as
//! `[u_0, l_0, u_1, l_1, ..., u_{b-1}, l_{b-1}]`.

use crate::error::{Error, Result};

/// Which bound-computation scheme produces the block pairs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ElbType {
    /// `lower = min`, `upper = max` over the block's raw values.
    Ele,
    /// Adaptive bounds: `pattern_block_mean +/- bound` from a [`CalcParam`].
    ElbGroup,
    /// Series-specific bounds: `series +/- pos/neg bound`.
    Ss,
}

impl ElbType {
    /// Parses the `elb_type` configuration key. Defaults to `ELE`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "ELE" => Ok(Self::Ele),
            "ELB_GROUP" => Ok(Self::ElbGroup),
            "SS" => Ok(Self::Ss),
            other => Err(Error::Config(format!("unknown elb_type {other}"))),
        }
    }
}

/// Built-in fallback for `elb_threshold_ratio` when neither it nor
/// `elb_threshold_base` is configured.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.1;

/// How the per-block bound for [`ElbType::ElbGroup`]/[`ElbType::Ss`] is derived.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CalcParam {
    /// One scalar bound shared by every block, `threshold_base` (if set) or
    /// `threshold_ratio * sqrt(threshold)`, scaled by `1/sqrt(block_num)`.
    Single {
        /// Fixed per-block bound, if configured directly.
        threshold_base: Option<f64>,
        /// Ratio applied to the query threshold when `threshold_base` is absent.
        threshold_ratio: f64,
    },
}

impl CalcParam {
    /// Computes the scalar bound applied uniformly to every block.
    #[must_use]
    pub fn bound(&self, block_num: usize, query_threshold: f64) -> f64 {
        match self {
            Self::Single {
                threshold_base: Some(base),
                ..
            } => *base / (block_num.max(1) as f64).sqrt(),
            Self::Single {
                threshold_base: None,
                threshold_ratio,
            } => threshold_ratio * query_threshold.sqrt() / (block_num.max(1) as f64).sqrt(),
        }
    }
}

/// Computes `w = W / b` (rounded down); the last block gets the remainder.
#[must_use]
pub fn block_width(window_len: usize, block_num: usize) -> usize {
    if block_num == 0 {
        return window_len;
    }
    window_len / block_num
}

/// Returns the `[start, end)` half-open range of source indices for block `i`
/// of `b`, over a window of length `window_len`.
#[must_use]
pub fn block_range(window_len: usize, block_num: usize, i: usize) -> (usize, usize) {
    let w = block_width(window_len, block_num);
    let start = i * w;
    let end = if i + 1 == block_num {
        window_len
    } else {
        start + w
    };
    (start, end)
}

/// Extracts the `2 * block_num` ELB feature doubles for one window.
///
/// `values` is the window's raw (unaligned) sample sequence, length `W`.
/// `pattern_block_means`/`calc_param` are only consulted for
/// [`ElbType::ElbGroup`] and [`ElbType::Ss`]; `ELE` ignores them.
#[must_use]
pub fn extract(
    values: &[f64],
    block_num: usize,
    elb_type: ElbType,
    calc_param: Option<&CalcParam>,
    pattern_block_means: Option<&[f64]>,
    query_threshold: f64,
) -> Vec<f64> {
    let block_num = block_num.max(1).min(values.len().max(1));
    let mut out = Vec::with_capacity(block_num * 2);

    for i in 0..block_num {
        let (start, end) = block_range(values.len(), block_num, i);
        let block = values.get(start..end).unwrap_or(&[]);

        let (upper, lower) = match elb_type {
            ElbType::Ele => {
                let lower = block.iter().copied().fold(f64::INFINITY, f64::min);
                let upper = block.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (upper, lower)
            }
            ElbType::ElbGroup => {
                let mean = pattern_block_means.and_then(|m| m.get(i)).copied().unwrap_or(0.0);
                let bound = calc_param
                    .map(|c| c.bound(block_num, query_threshold))
                    .unwrap_or(0.0);
                (mean + bound, mean - bound)
            }
            ElbType::Ss => {
                let series = block.iter().copied().sum::<f64>() / block.len().max(1) as f64;
                let bound = calc_param
                    .map(|c| c.bound(block_num, query_threshold))
                    .unwrap_or(0.0);
                (series + bound, series - bound)
            }
        };

        out.push(upper);
        out.push(lower);
    }

    out
}

/// Byte size reported to the memory manager for one window's feature
/// + constant`).
#[must_use]
pub fn amortized_feature_size(block_num: usize) -> usize {
    2 * block_num * std::mem::size_of::<f64>() + 32
}

/// Per-block means of a query pattern, used by [`ElbType::ElbGroup`] at
/// query time.
#[must_use]
pub fn pattern_block_means(pattern: &[f64], block_num: usize) -> Vec<f64> {
    let block_num = block_num.max(1).min(pattern.len().max(1));
    (0..block_num)
        .map(|i| {
            let (start, end) = block_range(pattern.len(), block_num, i);
            let block = pattern.get(start..end).unwrap_or(&[]);
            block.iter().copied().sum::<f64>() / block.len().max(1) as f64
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ele_upper_lower_are_block_extrema() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let f = extract(&values, 2, ElbType::Ele, None, None, 0.0);
        // block 0: [1,2] -> upper=2 lower=1; block 1: [3,4] -> upper=4 lower=3
        assert_eq!(f, vec![2.0, 1.0, 4.0, 3.0]);
    }

    #[test]
    fn last_block_absorbs_remainder() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let f = extract(&values, 2, ElbType::Ele, None, None, 0.0);
        // w=2: block0=[1,2], block1=[3,4,5]
        assert_eq!(f, vec![2.0, 1.0, 5.0, 3.0]);
    }

    #[test]
    fn elb_group_centers_on_pattern_mean() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let calc = CalcParam::Single {
            threshold_base: Some(1.0),
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
        };
        let means = vec![5.0, 6.0];
        let f = extract(&values, 2, ElbType::ElbGroup, Some(&calc), Some(&means), 1.0);
        let bound = calc.bound(2, 1.0);
        assert_eq!(f, vec![5.0 + bound, 5.0 - bound, 6.0 + bound, 6.0 - bound]);
    }

    #[test]
    fn pattern_block_means_matches_manual_average() {
        let pattern = [2.0, 4.0, 6.0, 8.0];
        let means = pattern_block_means(&pattern, 2);
        assert_eq!(means, vec![3.0, 7.0]);
    }
}
