// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The query-time reader: tracks which time ranges are still
//! eligible as it pulls index chunks, prunes chunks that can't possibly
//! contribute, and post-processes R-tree candidates against the exact
//! distance.

pub mod chunk_heap;
pub mod time_range;

pub use chunk_heap::{ChunkHeap, IndexChunkMeta};
pub use time_range::TimeRange;

use crate::distance::DistanceKind;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::window::Identifier;
use std::sync::Arc;

/// The query reader's lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReaderState {
    /// Constructed, no chunks registered yet.
    Created,
    /// At least one chunk's coverage has been folded into `index_usable_range`.
    Initialized,
    /// Actively pulling and post-processing chunks.
    Scanning,
    /// Terminal: no further chunks may be registered or scanned.
    Released,
}

/// Drives one query over a sequence of flushed index chunks, maintaining
/// `allowed_range` (the time span still eligible to contribute results)
/// and `index_usable_range` (the time span actually covered by chunks seen
/// so far).
pub struct QueryReader {
    state: ReaderState,
    allowed_range: TimeRange,
    index_usable_range: TimeRange,
    chunks: ChunkHeap,
    metrics: Arc<Metrics>,
}

impl QueryReader {
    /// Creates a reader whose `allowed_range` starts as the full query
    /// time filter (commonly [`TimeRange::full`] or a caller-narrowed
    /// range).
    #[must_use]
    pub fn new(allowed_range: TimeRange, metrics: Arc<Metrics>) -> Self {
        Self {
            state: ReaderState::Created,
            allowed_range,
            index_usable_range: TimeRange::empty(),
            chunks: ChunkHeap::new(),
            metrics,
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The time range still eligible to contribute results. Only ever
    /// shrinks over the reader's lifetime (I5, P4).
    #[must_use]
    pub fn allowed_range(&self) -> &TimeRange {
        &self.allowed_range
    }

    /// The time range covered by chunks registered so far.
    #[must_use]
    pub fn index_usable_range(&self) -> &TimeRange {
        &self.index_usable_range
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ReaderState::Released {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Folds a newly discovered chunk's time coverage into
    /// `index_usable_range` and queues it for scanning.
    ///
    /// Per the design notes, an "unseq" (out-of-order/overlapping) chunk is
    /// still accepted here - it only ever *adds* usable coverage, and can
    /// never shrink `allowed_range` on its own; `allowed_range` only
    /// shrinks via [`Self::update_usable_range`] once a chunk has actually
    /// been searched and its covered span is known to be exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the reader has been released.
    pub fn update_index_chunks(&mut self, chunk: IndexChunkMeta) -> Result<()> {
        self.ensure_open()?;
        if self.state == ReaderState::Created {
            self.state = ReaderState::Initialized;
        }
        let span = TimeRange::single(chunk.start_time, chunk.end_time);
        self.index_usable_range = self.index_usable_range.union(&span);
        self.chunks.push(chunk);
        Ok(())
    }

    /// `true` if `chunk`'s time span doesn't intersect `allowed_range` at
    /// all, meaning it can be skipped without ever being deserialized
    ///.
    #[must_use]
    pub fn can_skip_data_range(&self, chunk: &IndexChunkMeta) -> bool {
        !self.allowed_range.overlaps(chunk.start_time, chunk.end_time)
    }

    /// Removes `consumed` from `allowed_range`, reflecting that a chunk
    /// covering that span has now been fully searched (I5: `allowed_range`
    /// only ever shrinks).
    pub fn update_usable_range(&mut self, consumed: &TimeRange) {
        self.allowed_range = self.allowed_range.difference(consumed);
    }

    /// Pops the next chunk in time order, or `None` if the queue is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the reader has been released.
    pub fn next_chunk(&mut self) -> Result<Option<IndexChunkMeta>> {
        self.ensure_open()?;
        self.state = ReaderState::Scanning;

        while let Some(chunk) = self.chunks.pop() {
            if self.can_skip_data_range(&chunk) {
                self.metrics.inc_chunks_pruned();
                continue;
            }
            return Ok(Some(chunk));
        }
        Ok(None)
    }

    /// Evaluates the exact distance between `pattern` and each candidate's
    /// raw window (fetched via `fetch_raw`), keeping only those within
    /// `threshold` (`postProcessNext`, the real filtering step since the
    /// R-tree itself performs none per
    /// [`crate::mbr_index::MBRIndex::lower_bound`]).
    ///
    /// # Errors
    ///
    /// Propagates whatever `fetch_raw` returns for a candidate it cannot
    /// resolve.
    pub fn append_data_and_post_process(
        &mut self,
        candidates: &[Identifier],
        pattern: &[f64],
        distance: DistanceKind,
        threshold: f64,
        mut fetch_raw: impl FnMut(Identifier) -> Result<Vec<f64>>,
    ) -> Result<Vec<Identifier>> {
        self.ensure_open()?;
        let mut out = Vec::new();

        for &id in candidates {
            let raw = fetch_raw(id)?;
            if raw.len() != pattern.len() {
                continue;
            }
            let d = distance.eval(pattern, &raw);
            if d <= threshold {
                out.push(id);
            }
        }

        Ok(out)
    }

    /// Enters the terminal released state; no further chunks may be
    /// registered or scanned.
    pub fn release(&mut self) {
        self.state = ReaderState::Released;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn meta(path: &str, start: i64, end: i64) -> IndexChunkMeta {
        IndexChunkMeta {
            path: path.into(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn starts_in_created_state() {
        let reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
        assert_eq!(reader.state(), ReaderState::Created);
    }

    #[test]
    fn registering_a_chunk_grows_usable_range_and_initializes() {
        let mut reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
        reader.update_index_chunks(meta("c0", 0, 100)).unwrap();
        assert_eq!(reader.state(), ReaderState::Initialized);
        assert!(reader.index_usable_range().overlaps(0, 100));
    }

    #[test]
    fn can_skip_data_range_prunes_chunks_outside_allowed_range_scenario_5() {
        let allowed = TimeRange::single(1000, 2000);
        let reader = QueryReader::new(allowed, Arc::new(Metrics::new()));
        assert!(reader.can_skip_data_range(&meta("old", 0, 500)));
        assert!(!reader.can_skip_data_range(&meta("overlap", 1500, 2500)));
    }

    #[test]
    fn allowed_range_never_grows_across_updates_p4() {
        let mut reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
        let before = reader.allowed_range().clone();
        reader.update_usable_range(&TimeRange::single(0, 100));
        let after = reader.allowed_range().clone();
        for &(s, e) in after.intervals() {
            assert!(before.overlaps(s, e));
        }
        assert!(!after.overlaps(50, 51));
    }

    #[test]
    fn released_reader_rejects_further_calls() {
        let mut reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
        reader.release();
        assert!(reader.update_index_chunks(meta("c0", 0, 1)).is_err());
        assert!(reader.next_chunk().is_err());
    }

    #[test]
    fn post_process_filters_by_exact_distance() {
        let mut reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
        let ids = vec![Identifier::new(0, 3, 4), Identifier::new(10, 13, 4)];
        let pattern = vec![1.0, 1.0, 1.0, 1.0];

        let result = reader
            .append_data_and_post_process(&ids, &pattern, DistanceKind::Euclidean, 0.5, |id| {
                if id.start_time == 0 {
                    Ok(vec![1.0, 1.0, 1.0, 1.0])
                } else {
                    Ok(vec![100.0, 100.0, 100.0, 100.0])
                }
            })
            .unwrap();

        assert_eq!(result, vec![Identifier::new(0, 3, 4)]);
    }
}
