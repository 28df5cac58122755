// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Index and query configuration, parsed from the host's
//! key/value property table.

use crate::buffer::DataType;
use crate::distance::DistanceKind;
use crate::elb::{CalcParam, ElbType, DEFAULT_THRESHOLD_RATIO};
use crate::error::{Error, Result};
use crate::range_strategy::RangeStrategy;
use crate::rtree::SeedPicker;

/// Fully resolved, validated configuration for one ELB/R-tree index
/// instance.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// The indexed series' numeric type.
    pub data_type: DataType,
    /// Which buffered windows are eligible for indexing.
    pub range_strategy: RangeStrategy,
    /// `W`: window length in points.
    pub window_range: u32,
    /// `S`: slide step in points.
    pub slide_step: u32,
    /// `b`: number of ELB blocks per window.
    pub feature_dim: usize,
    /// R-tree node fanout ceiling.
    pub max_entries: usize,
    /// R-tree node fanout floor.
    pub min_entries: usize,
    /// Which seed-picking algorithm node splits use.
    pub seed_picker: SeedPicker,
    /// Default query distance, when a query doesn't override it.
    pub distance: DistanceKind,
    /// Which ELB variant computes block bounds.
    pub elb_type: ElbType,
    /// Bound-calculation parameters for `ELB_GROUP`/`SS`; unused by `ELE`.
    pub elb_calc_param: Option<CalcParam>,
    /// Keep the current chunk's identifier list in memory.
    pub store_identifier: bool,
    /// Materialize the L2 aligned sequence per window.
    pub store_aligned: bool,
}

/// Builds an [`IndexConfig`] from the host's `index_*` property table
///, normalizing and validating on [`IndexConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct IndexConfigBuilder {
    data_type: DataType,
    range_strategy_raw: String,
    since: Option<i64>,
    within: Option<(i64, i64)>,
    window_range: u32,
    slide_step: u32,
    feature_dim: usize,
    max_entries: usize,
    min_entries: usize,
    seed_picker_raw: String,
    distance_raw: String,
    elb_type_raw: String,
    threshold_base: Option<f64>,
    threshold_ratio: Option<f64>,
    store_identifier: bool,
    store_aligned: bool,
}

impl IndexConfigBuilder {
    /// Starts a builder with the documented defaults for every key.
    #[must_use]
    pub fn new(data_type: DataType, window_range: u32) -> Self {
        Self {
            data_type,
            range_strategy_raw: "default".into(),
            since: None,
            within: None,
            window_range,
            slide_step: 0,
            feature_dim: 4,
            max_entries: 32,
            min_entries: 12,
            seed_picker_raw: "LINEAR".into(),
            distance_raw: "Euclidean".into(),
            elb_type_raw: "ELE".into(),
            threshold_base: None,
            threshold_ratio: None,
            store_identifier: true,
            store_aligned: false,
        }
    }

    /// Sets `index_range_strategy` (`default`/`all`/`within`).
    #[must_use]
    pub fn range_strategy(mut self, raw: impl Into<String>) -> Self {
        self.range_strategy_raw = raw.into();
        self
    }

    /// Sets the `since` bound used by `index_range_strategy=default`.
    #[must_use]
    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the `[start, end)` bound used by `index_range_strategy=within`.
    #[must_use]
    pub fn within(mut self, start: i64, end: i64) -> Self {
        self.within = Some((start, end));
        self
    }

    /// Sets `index_slide_step`. `0` means "same as `window_range`".
    #[must_use]
    pub fn slide_step(mut self, slide_step: u32) -> Self {
        self.slide_step = slide_step;
        self
    }

    /// Sets `feature_dim` (number of ELB blocks per window).
    #[must_use]
    pub fn feature_dim(mut self, feature_dim: usize) -> Self {
        self.feature_dim = feature_dim;
        self
    }

    /// Sets `index_max_entries` (R-tree node fanout ceiling).
    #[must_use]
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets `index_min_entries` (R-tree node fanout floor).
    #[must_use]
    pub fn min_entries(mut self, min_entries: usize) -> Self {
        self.min_entries = min_entries;
        self
    }

    /// Sets `seed_picker` (`LINEAR`/`QUADRATIC`).
    #[must_use]
    pub fn seed_picker(mut self, raw: impl Into<String>) -> Self {
        self.seed_picker_raw = raw.into();
        self
    }

    /// Sets the default query `distance` (`Euclidean`/`DTW`).
    #[must_use]
    pub fn distance(mut self, raw: impl Into<String>) -> Self {
        self.distance_raw = raw.into();
        self
    }

    /// Sets `elb_type` (`ELE`/`ELB_GROUP`/`SS`).
    #[must_use]
    pub fn elb_type(mut self, raw: impl Into<String>) -> Self {
        self.elb_type_raw = raw.into();
        self
    }

    /// Sets a fixed `elb_threshold_base`, overriding `elb_threshold_ratio`.
    #[must_use]
    pub fn elb_threshold_base(mut self, base: f64) -> Self {
        self.threshold_base = Some(base);
        self
    }

    /// Sets `elb_threshold_ratio`, used when `elb_threshold_base` is absent.
    #[must_use]
    pub fn elb_threshold_ratio(mut self, ratio: f64) -> Self {
        self.threshold_ratio = Some(ratio);
        self
    }

    /// Sets whether the current chunk's identifier list stays in memory.
    #[must_use]
    pub fn store_identifier(mut self, store: bool) -> Self {
        self.store_identifier = store;
        self
    }

    /// Sets whether `process_next` also materializes the L2 aligned sequence.
    #[must_use]
    pub fn store_aligned(mut self, store: bool) -> Self {
        self.store_aligned = store;
        self
    }

    /// Validates and normalizes the configured values into an [`IndexConfig`].
    ///
    /// `min_entries`/`max_entries` are swapped (with a logged warning) if
    /// configured inverted; `feature_dim` of `0` is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `window_range` is `0`, `feature_dim` is
    /// `0`, or an enum-valued key doesn't parse.
    pub fn build(self) -> Result<IndexConfig> {
        if self.window_range == 0 {
            return Err(Error::Config("index_window_range must be > 0".into()));
        }
        if self.feature_dim == 0 {
            return Err(Error::Config("feature_dim must be > 0".into()));
        }

        let (mut min_entries, mut max_entries) = (self.min_entries, self.max_entries);
        if min_entries > max_entries {
            log::warn!(
                "index_min_entries ({min_entries}) > index_max_entries ({max_entries}); swapping"
            );
            std::mem::swap(&mut min_entries, &mut max_entries);
        }
        if max_entries < 2 {
            max_entries = 2;
        }
        if min_entries > max_entries / 2 {
            min_entries = max_entries / 2;
        }
        if min_entries == 0 {
            min_entries = 1;
        }

        let range_strategy = RangeStrategy::parse(&self.range_strategy_raw, self.since, self.within)?;
        let seed_picker = SeedPicker::parse(&self.seed_picker_raw)?;
        let distance = DistanceKind::parse(&self.distance_raw)?;
        let elb_type = ElbType::parse(&self.elb_type_raw)?;

        let elb_calc_param = match elb_type {
            ElbType::Ele => None,
            ElbType::ElbGroup | ElbType::Ss => Some(CalcParam::Single {
                threshold_base: self.threshold_base,
                threshold_ratio: self.threshold_ratio.unwrap_or(DEFAULT_THRESHOLD_RATIO),
            }),
        };

        Ok(IndexConfig {
            data_type: self.data_type,
            range_strategy,
            window_range: self.window_range,
            slide_step: if self.slide_step == 0 {
                self.window_range
            } else {
                self.slide_step
            },
            feature_dim: self.feature_dim,
            max_entries,
            min_entries,
            seed_picker,
            distance,
            elb_type,
            elb_calc_param,
            store_identifier: self.store_identifier,
            store_aligned: self.store_aligned,
        })
    }
}

/// Query-time configuration: a pattern to search for and an
/// optional distance threshold.
#[derive(Clone, Debug)]
pub struct QueryConfig {
    /// The raw query pattern, resampled by the caller to the index's `W`
    /// before being passed in.
    pub pattern: Vec<f64>,
    /// Maximum allowed distance. Defaults to `+infinity` (return everything).
    pub threshold: f64,
    /// Distance function to evaluate candidates with; `None` means "use
    /// the index's configured default".
    pub distance: Option<DistanceKind>,
}

impl QueryConfig {
    /// Builds a query configuration for `pattern` with threshold `+infinity`
    /// and the index's default distance.
    #[must_use]
    pub fn new(pattern: Vec<f64>) -> Self {
        Self {
            pattern,
            threshold: f64::INFINITY,
            distance: None,
        }
    }

    /// Sets an explicit distance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Overrides the distance function for this query only.
    #[must_use]
    pub fn with_distance(mut self, distance: DistanceKind) -> Self {
        self.distance = Some(distance);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn swaps_inverted_min_max_entries_scenario_6() {
        let cfg = IndexConfigBuilder::new(DataType::Float64, 16)
            .max_entries(4)
            .min_entries(10)
            .build()
            .unwrap();
        assert!(cfg.min_entries <= cfg.max_entries);
    }

    #[test]
    fn rejects_zero_window_range() {
        let result = IndexConfigBuilder::new(DataType::Float64, 0).build();
        assert!(result.is_err());
    }

    #[test]
    fn slide_step_defaults_to_window_range() {
        let cfg = IndexConfigBuilder::new(DataType::Float64, 10).build().unwrap();
        assert_eq!(cfg.slide_step, 10);
    }

    #[test]
    fn elb_group_requires_calc_param() {
        let cfg = IndexConfigBuilder::new(DataType::Float64, 10)
            .elb_type("ELB_GROUP")
            .build()
            .unwrap();
        assert!(cfg.elb_calc_param.is_some());
    }
}
