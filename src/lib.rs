// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An in-memory similarity-search index over equal-length subsequences of
//! a time series.
//!
//! ##### About
//!
//! A sliding-window preprocessor cuts an append-only `<time, value>`
//! stream into fixed-length, possibly overlapping windows. Each window is
//! reduced to an Equal-Length Block (ELB) feature - a small, lower-bounding
//! summary safe to prune against without ever discarding a true match
//! (I4). Features are indexed in an in-memory R-tree keyed by feature-space
//! minimum bounding rectangles, then serialized once the host decides to
//! flush.
//!
//! At query time, [`MBRIndex::query_by_index`] deserializes a flushed
//! chunk and returns candidate windows; a [`query::QueryReader`] tracks
//! which time ranges remain eligible across chunks (pruning chunks whose
//! span can't possibly contribute) and narrows candidates down to an exact
//! match against the raw series via `append_data_and_post_process`.
//!
//! # Example usage
//!
//! ```
//! use simsearch_index::{
//!     buffer::DataType, config::{IndexConfigBuilder, QueryConfig},
//!     mbr_index::MBRIndex, metrics::Metrics, pool::BufferPool,
//! };
//! use std::sync::Arc;
//!
//! let config = IndexConfigBuilder::new(DataType::Float64, 4)
//!     .feature_dim(2)
//!     .build()?;
//!
//! let pool = Arc::new(BufferPool::new());
//! let metrics = Arc::new(Metrics::new());
//! let mut index = MBRIndex::new(config, pool, metrics);
//!
//! let times: Vec<i64> = (0..8).collect();
//! let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 9.0, 10.0, 11.0, 12.0];
//! index.append(&times, &values)?;
//!
//! while index.build_next()? {}
//!
//! let chunk = index.flush("chunk-0");
//!
//! let query = QueryConfig::new(vec![1.0, 2.0, 3.0, 4.0]).with_threshold(1.0);
//! let candidates = index.query_by_index(&chunk.body, &query)?;
//! assert!(!candidates.is_empty());
//! #
//! # Ok::<(), simsearch_index::error::Error>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

pub mod align;
pub mod binary_search;
pub mod buffer;
pub mod coding;
pub mod config;
pub mod distance;
pub mod elb;
pub mod error;
pub mod flush;
pub mod mbr_index;
pub mod metrics;
pub mod pool;
pub mod preprocessor;
pub mod query;
pub mod range_strategy;
pub mod rtree;
pub mod window;

pub use buffer::DataType;
pub use config::{IndexConfig, IndexConfigBuilder, QueryConfig};
pub use distance::DistanceKind;
pub use error::{Error, Result};
pub use flush::{IndexFlushChunk, IndexType};
pub use mbr_index::MBRIndex;
pub use metrics::Metrics;
pub use pool::BufferPool;
pub use query::{ChunkHeap, IndexChunkMeta, QueryReader, ReaderState, TimeRange};
pub use window::Identifier;
