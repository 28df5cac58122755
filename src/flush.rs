// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The unit [`MBRIndex::flush`](crate::mbr_index::MBRIndex::flush) hands
//! back to the host's flush scheduler.

/// Which family of index a flushed chunk belongs to. Currently only the
/// ELB/R-tree index is implemented; the variant exists so the on-disk
/// format can distinguish future index families without a breaking change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexType {
    /// The ELB feature extractor backed by an in-memory R-tree.
    Elb,
}

/// One immutable, serialized index chunk, ready for the host to persist
/// and later hand back unmodified to [`crate::query::QueryReader`].
#[derive(Clone, Debug)]
pub struct IndexFlushChunk {
    /// Host-assigned path/handle the chunk will be written under. The
    /// index itself never touches the filesystem; this is bookkeeping
    /// the caller supplies so later query-time callbacks can name the
    /// chunk they're dealing with.
    pub path: String,
    /// Which index family produced this chunk.
    pub index_type: IndexType,
    /// The serialized R-tree body, in post-order layout.
    pub body: Vec<u8>,
    /// Inclusive lower time bound covered by this chunk.
    pub start_time: i64,
    /// Inclusive upper time bound covered by this chunk.
    pub end_time: i64,
}

impl IndexFlushChunk {
    /// Total in-memory size of this chunk, for the host's flush-size accounting.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.body.len() + self.path.len() + std::mem::size_of::<i64>() * 2
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_accounts_for_body_and_path() {
        let chunk = IndexFlushChunk {
            path: "chunk-0".into(),
            index_type: IndexType::Elb,
            body: vec![0; 100],
            start_time: 0,
            end_time: 10,
        };
        assert_eq!(chunk.byte_size(), 100 + "chunk-0".len() + 16);
    }
}
