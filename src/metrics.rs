// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Process-wide counters: index memory accounting and
//! query-time pruning effectiveness.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// Atomic counters shared the same way as [`crate::pool::BufferPool`]: an
/// explicit `Arc<Metrics>`, not a hidden global.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Running total of amortized feature bytes currently held in memory.
    amortized_bytes: AtomicU64,

    /// Total candidate identifiers returned by `searchWithThreshold` calls.
    candidates_returned: AtomicU64,

    /// Number of index chunks a query reader decided it could skip entirely
    ///.
    chunks_pruned: AtomicU64,

    /// Number of index chunks actually deserialized and searched.
    chunks_unpacked: AtomicU64,

    /// Number of chunks that failed to unpack and were skipped
    /// (`Error::ChunkUnpackError`).
    chunk_unpack_errors: AtomicU64,
}

impl Metrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_amortized_bytes(&self, delta: i64) {
        if delta >= 0 {
            #[allow(clippy::cast_sign_loss)]
            self.amortized_bytes.fetch_add(delta as u64, Relaxed);
        } else {
            #[allow(clippy::cast_sign_loss)]
            self.amortized_bytes.fetch_sub((-delta) as u64, Relaxed);
        }
    }

    pub(crate) fn add_candidates(&self, count: u64) {
        self.candidates_returned.fetch_add(count, Relaxed);
    }

    pub(crate) fn inc_chunks_pruned(&self) {
        self.chunks_pruned.fetch_add(1, Relaxed);
    }

    pub(crate) fn inc_chunks_unpacked(&self) {
        self.chunks_unpacked.fetch_add(1, Relaxed);
    }

    pub(crate) fn inc_chunk_unpack_errors(&self) {
        self.chunk_unpack_errors.fetch_add(1, Relaxed);
    }

    /// Current amortized byte estimate across live, unflushed index state.
    #[must_use]
    pub fn amortized_bytes(&self) -> u64 {
        self.amortized_bytes.load(Relaxed)
    }

    /// Total candidates ever returned by a pre-filtering R-tree search.
    #[must_use]
    pub fn candidates_returned(&self) -> u64 {
        self.candidates_returned.load(Relaxed)
    }

    /// Total index chunks skipped without deserializing.
    #[must_use]
    pub fn chunks_pruned(&self) -> u64 {
        self.chunks_pruned.load(Relaxed)
    }

    /// Total index chunks deserialized and searched.
    #[must_use]
    pub fn chunks_unpacked(&self) -> u64 {
        self.chunks_unpacked.load(Relaxed)
    }

    /// Total chunks that failed to deserialize and were skipped.
    #[must_use]
    pub fn chunk_unpack_errors(&self) -> u64 {
        self.chunk_unpack_errors.load(Relaxed)
    }

    /// Fraction of index chunks pruned before ever being unpacked - the
    /// time-range filter's effectiveness.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn prune_efficiency(&self) -> f64 {
        let pruned = self.chunks_pruned.load(Relaxed) as f64;
        let unpacked = self.chunks_unpacked.load(Relaxed) as f64;
        let total = pruned + unpacked;
        if total == 0.0 {
            0.0
        } else {
            pruned / total
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn prune_efficiency_ignores_empty_history() {
        let m = Metrics::new();
        assert_eq!(m.prune_efficiency(), 0.0);
    }

    #[test]
    fn prune_efficiency_reflects_pruned_ratio() {
        let m = Metrics::new();
        m.inc_chunks_pruned();
        m.inc_chunks_pruned();
        m.inc_chunks_pruned();
        m.inc_chunks_unpacked();
        assert!((m.prune_efficiency() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn amortized_bytes_tracks_signed_deltas() {
        let m = Metrics::new();
        m.add_amortized_bytes(100);
        m.add_amortized_bytes(-40);
        assert_eq!(m.amortized_bytes(), 60);
    }
}
