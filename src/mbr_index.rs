// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Wires the preprocessor, the ELB extractor, and the R-tree into one
//! index instance.
//!
//! This is the composition point the design notes call for: the
//! preprocessor knows nothing of ELB, ELB knows nothing of R-trees, and
//! `MBRIndex` is the only place that drives all three together, pulling
//! one window at a time through [`CountFixedPreprocessor::has_next`] /
//! [`CountFixedPreprocessor::process_next`].

use crate::config::{IndexConfig, QueryConfig};
use crate::elb;
use crate::error::{Error, Result};
use crate::flush::{IndexFlushChunk, IndexType};
use crate::metrics::Metrics;
use crate::pool::BufferPool;
use crate::preprocessor::{CountFixedConfig, CountFixedPreprocessor};
use crate::rtree::{codec, RTree};
use crate::window::Identifier;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::sync::Arc;

/// An ELB-feature-space R-tree index over one series (spec's central
/// integration: §4.1 + §4.2 + §4.3 driven together).
pub struct MBRIndex {
    config: IndexConfig,
    preprocessor: CountFixedPreprocessor,
    tree: RTree<Identifier>,
    metrics: Arc<Metrics>,
}

impl MBRIndex {
    /// Creates a fresh, empty index.
    #[must_use]
    pub fn new(config: IndexConfig, pool: Arc<BufferPool>, metrics: Arc<Metrics>) -> Self {
        let preprocessor_config = CountFixedConfig {
            data_type: config.data_type,
            window_range: config.window_range,
            slide_step: config.slide_step,
            store_identifier: config.store_identifier,
            store_aligned: config.store_aligned,
        };
        let tree = RTree::new(
            config.feature_dim * 2,
            config.max_entries,
            config.min_entries,
            config.seed_picker,
        );
        Self {
            config,
            preprocessor: CountFixedPreprocessor::new(preprocessor_config, pool),
            tree,
            metrics,
        }
    }

    /// Appends raw `<time, value>` samples to the underlying preprocessor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the index has entered its terminal
    /// closed state.
    pub fn append(&mut self, times: &[i64], values: &[f64]) -> Result<()> {
        self.preprocessor.append(times, values)
    }

    /// Pulls, features, and indexes the single next eligible window, if
    /// any. Returns `false` once fewer than `W` buffered points remain
    /// ahead of the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the index is closed, or [`Error::Fatal`]
    /// if the preprocessor's internal invariants broke.
    pub fn build_next(&mut self) -> Result<bool> {
        if !self.preprocessor.has_next(&self.config.range_strategy)? {
            return Ok(false);
        }

        let (id, raw_values) = self.preprocessor.process_next()?;

        let pattern_block_means = match self.config.elb_type {
            elb::ElbType::Ele => None,
            elb::ElbType::ElbGroup | elb::ElbType::Ss => {
                Some(elb::pattern_block_means(&raw_values, self.config.feature_dim))
            }
        };

        let feature = elb::extract(
            &raw_values,
            self.config.feature_dim,
            self.config.elb_type,
            self.config.elb_calc_param.as_ref(),
            pattern_block_means.as_deref(),
            0.0,
        );

        let (min, max) = feature_to_mbr_bounds(&feature);
        self.tree.insert_rect(&min, &max, id);

        self.metrics
            .add_amortized_bytes(elb::amortized_feature_size(self.config.feature_dim) as i64);

        Ok(true)
    }

    /// Serializes the current tree into an immutable chunk for the host to
    /// persist. Unlike `clear`, this does **not** reset the tree or the
    /// preprocessor - repeated sub-flushes within one logical chunk all see
    /// the cumulative tree built so far.
    #[must_use]
    pub fn flush(&self, path: impl Into<String>) -> IndexFlushChunk {
        let body = codec::serialize(&self.tree, |id, buf| encode_identifier(id, buf));
        let (start_time, end_time) = self.preprocessor.chunk_bounds().unwrap_or((0, 0));
        IndexFlushChunk {
            path: path.into(),
            index_type: IndexType::Elb,
            body,
            start_time,
            end_time,
        }
    }

    /// Resets both the R-tree and the preprocessor's per-chunk state, ready
    /// to build the next chunk from scratch.
    pub fn clear(&mut self) {
        self.preprocessor.clear();
        self.tree = RTree::new(
            self.config.feature_dim * 2,
            self.config.max_entries,
            self.config.min_entries,
            self.config.seed_picker,
        );
        self.metrics.add_amortized_bytes(-(self.amortized_size() as i64));
    }

    /// Releases pooled buffers and enters the terminal closed state.
    pub fn close(&mut self) {
        self.preprocessor.close_and_release();
    }

    /// Approximate live memory footprint: per-window feature cost plus a
    /// constant per-node overhead for the R-tree structure itself
    ///.
    #[must_use]
    pub fn amortized_size(&self) -> usize {
        let feature_bytes = self.tree.len() * elb::amortized_feature_size(self.config.feature_dim);
        let node_overhead = 64;
        feature_bytes + node_overhead
    }

    /// The lower-bounding threshold passed to the R-tree's own
    /// `searchWithThreshold`.
    ///
    /// This always returns `0.0`: the ELB-backed MBR index performs no
    /// pruning at the R-tree level. The tree is only used to organize
    /// identifiers by feature-space locality; actual distance filtering
    /// happens downstream, in `QueryReader::append_data_and_post_process`,
    /// against exact raw window values. Preserved exactly as a documented
    /// correctness-over-performance tradeoff (see DESIGN.md).
    #[must_use]
    pub fn lower_bound(&self, _user_threshold: f64) -> f64 {
        0.0
    }

    /// Deserializes a previously flushed chunk and returns the candidate
    /// identifiers whose feature MBR falls within [`Self::lower_bound`] of
    /// the query pattern's per-block means.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptChunk`] if the chunk's feature dimension
    /// doesn't match this index's configuration, or
    /// [`Error::ChunkUnpackError`] if the bytes are truncated/malformed.
    pub fn query_by_index(&self, chunk_bytes: &[u8], query: &QueryConfig) -> Result<Vec<Identifier>> {
        let tree: RTree<Identifier> = codec::deserialize(chunk_bytes, decode_identifier)?;

        if tree.dim() != self.config.feature_dim * 2 {
            return Err(Error::CorruptChunk(format!(
                "chunk feature dim {} does not match configured feature_dim {}",
                tree.dim(),
                self.config.feature_dim
            )));
        }

        let means = elb::pattern_block_means(&query.pattern, self.config.feature_dim);
        let corner: Vec<f32> = means.iter().flat_map(|&m| [m, m]).map(|v| v as f32).collect();

        let threshold = self.lower_bound(query.threshold);
        let candidates = tree.search_with_threshold(&corner, 0.0, threshold);

        self.metrics.add_candidates(candidates.len() as u64);
        self.metrics.inc_chunks_unpacked();

        Ok(candidates)
    }
}

/// Splits a flat `[u_0, l_0, u_1, l_1, ...]` ELB feature into the R-tree's
/// `(min, max)` rectangle bounds. Each block contributes two MBR
/// dimensions (the upper axis and the lower axis), both pinned to a
/// degenerate `[bound, bound]` interval since a single window's feature is
/// a point in this space, not a range.
fn feature_to_mbr_bounds(feature: &[f64]) -> (Vec<f32>, Vec<f32>) {
    let mut min = Vec::with_capacity(feature.len());
    let mut max = Vec::with_capacity(feature.len());
    for pair in feature.chunks(2) {
        let upper = pair.first().copied().unwrap_or(0.0) as f32;
        let lower = pair.get(1).copied().unwrap_or(0.0) as f32;
        let (lo, hi) = if lower <= upper { (lower, upper) } else { (upper, lower) };
        min.push(lo);
        min.push(lo);
        max.push(hi);
        max.push(hi);
    }
    (min, max)
}

fn encode_identifier(id: &Identifier, buf: &mut Vec<u8>) {
    #[allow(clippy::unwrap_used)]
    buf.write_i64::<LittleEndian>(id.start_time).unwrap();
    #[allow(clippy::unwrap_used)]
    buf.write_i64::<LittleEndian>(id.end_time).unwrap();
    #[allow(clippy::unwrap_used)]
    buf.write_u32::<LittleEndian>(id.count).unwrap();
}

fn decode_identifier(bytes: &[u8]) -> Result<Identifier> {
    let mut cursor: &[u8] = bytes;
    let start_time = cursor.read_i64::<LittleEndian>().map_err(Error::ChunkUnpackError)?;
    let end_time = cursor.read_i64::<LittleEndian>().map_err(Error::ChunkUnpackError)?;
    let count = cursor.read_u32::<LittleEndian>().map_err(Error::ChunkUnpackError)?;
    Ok(Identifier::new(start_time, end_time, count))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::buffer::DataType;
    use crate::config::IndexConfigBuilder;

    fn test_index() -> MBRIndex {
        let config = IndexConfigBuilder::new(DataType::Float64, 4)
            .feature_dim(2)
            .max_entries(8)
            .min_entries(2)
            .build()
            .unwrap();
        MBRIndex::new(config, Arc::new(BufferPool::new()), Arc::new(Metrics::new()))
    }

    #[test]
    fn build_indexes_every_window_scenario_1() {
        let mut index = test_index();
        let times: Vec<i64> = (0..12).collect();
        let values: Vec<f64> = vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 1.0, 2.0, 3.0, 20.0, 21.0, 22.0];
        index.append(&times, &values).unwrap();

        let mut count = 0;
        while index.build_next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 9);
        assert_eq!(index.tree.len(), 9);
    }

    #[test]
    fn flush_does_not_reset_tree_scenario_4() {
        let mut index = test_index();
        let times: Vec<i64> = (0..8).collect();
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        index.append(&times, &values).unwrap();
        while index.build_next().unwrap() {}

        let before = index.tree.len();
        let chunk = index.flush("chunk-0");
        assert!(!chunk.body.is_empty());
        assert_eq!(index.tree.len(), before);
    }

    #[test]
    fn clear_resets_tree_and_preprocessor() {
        let mut index = test_index();
        let times: Vec<i64> = (0..8).collect();
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        index.append(&times, &values).unwrap();
        while index.build_next().unwrap() {}

        index.clear();
        assert_eq!(index.tree.len(), 0);
        assert_eq!(index.preprocessor.slice_num(), 0);
    }

    #[test]
    fn query_by_index_finds_similar_window() {
        let mut index = test_index();
        let times: Vec<i64> = (0..12).collect();
        let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 100.0, 101.0, 102.0, 103.0, 1.0, 2.0, 3.0, 4.0];
        index.append(&times, &values).unwrap();
        while index.build_next().unwrap() {}

        let chunk = index.flush("chunk-0");
        let query = QueryConfig::new(vec![1.0, 2.0, 3.0, 4.0]).with_threshold(5.0);
        let candidates = index.query_by_index(&chunk.body, &query).unwrap();
        assert!(!candidates.is_empty());
    }
}
