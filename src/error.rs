// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};

/// Which structural invariant was found violated.
///
/// A `Fatal` error always carries one of these so the caller can tell a
/// genuine bug in this crate apart from ordinary misuse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Invariant {
    /// I1: windows emitted within one flush are not `slide_step` apart.
    MonotoneWindows,

    /// I2: an internal node's MBR is not the tight bound of its children.
    MbrContainment,

    /// I3: a non-root node holds fewer than `minEntries` or more than `maxEntries`.
    NodeCapacity,

    /// I4: the pruning rule discarded an entry that could not be proven out of range.
    LowerBoundSafety,

    /// I5: `allowed_range` is no longer a subset of `universe \ (chunk_pruned ∩ index_usable)`.
    TimeFilterConsistency,
}

impl std::fmt::Display for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MonotoneWindows => "I1 (monotone windows)",
            Self::MbrContainment => "I2 (MBR containment)",
            Self::NodeCapacity => "I3 (capacity)",
            Self::LowerBoundSafety => "I4 (lower-bound safety)",
            Self::TimeFilterConsistency => "I5 (time-filter consistency)",
        };
        write!(f, "{name}")
    }
}

/// Errors that can occur while building, flushing, or querying an index.
///
/// `ConfigError`, `UnsupportedQuery` and `DataTypeError` are reported synchronously to
/// the caller of the offending method. `CorruptChunk` surfaces a
/// structural inconsistency found while deserializing a chunk.
/// `ChunkUnpackError` is transient: the query reader logs it and skips the
/// chunk. `Fatal` means an internal invariant broke; the index that raised
/// it must be treated as closed.
#[derive(Debug)]
pub enum Error {
    /// A configuration key was missing, malformed, or out of range.
    Config(String),

    /// The requested aggregator or distance is not supported by this index type.
    UnsupportedQuery(String),

    /// The series' data type is not numeric.
    DataType(String),

    /// A chunk's R-tree body was short or structurally inconsistent.
    CorruptChunk(String),

    /// I/O failure while reading an index chunk from the host. Transient:
    /// logged by the reader, the chunk is skipped, the query continues.
    ChunkUnpackError(std::io::Error),

    /// An internal invariant (I1-I5) was violated. The index that raised
    /// this enters a terminal closed state and rejects further calls.
    Fatal(Invariant),

    /// The index (or one of its collaborators) was used after `delete()`
    /// or after a prior `Fatal` error closed it.
    Closed,

    /// I/O error, other than an in-query chunk unpack failure.
    Io(std::io::Error),

    /// Serialization failed.
    Encode(EncodeError),

    /// Deserialization failed.
    Decode(DecodeError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "ConfigError: {msg}"),
            Self::UnsupportedQuery(msg) => write!(f, "UnsupportedQuery: {msg}"),
            Self::DataType(msg) => write!(f, "DataTypeError: {msg}"),
            Self::CorruptChunk(msg) => write!(f, "CorruptChunk: {msg}"),
            Self::ChunkUnpackError(e) => write!(f, "ChunkUnpackError: {e}"),
            Self::Fatal(inv) => write!(f, "Fatal: invariant {inv} violated"),
            Self::Closed => write!(f, "index is closed"),
            Self::Io(e) => write!(f, "IoError: {e}"),
            Self::Encode(e) => write!(f, "EncodeError: {e}"),
            Self::Decode(e) => write!(f, "DecodeError: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ChunkUnpackError(e) | Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
