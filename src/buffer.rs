// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Typed, append-only value buffers.
//!
//! A series is typed as one of `i32`/`i64`/`f32`/`f64`. The preprocessor
//! buffers raw `<time, value>` points in one of these, growing by doubling
//! like a `Vec`, and hands the buffer back to a [`crate::pool::BufferPool`]
//! once a chunk's data has been consumed.

use crate::error::{Error, Result};

/// The numeric data type of a time-series path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

impl DataType {
    /// Maps a host tsfile type tag to a [`DataType`].
    ///
    /// Host type systems carry non-numeric series types (text, boolean)
    /// that this index cannot build features over; those map to
    /// [`Error::DataType`] here, which is the boundary for a rejected tag.
    pub fn from_host_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Int32),
            1 => Ok(Self::Int64),
            2 => Ok(Self::Float32),
            3 => Ok(Self::Float64),
            other => Err(Error::DataType(format!(
                "host type tag {other} is not a supported numeric type"
            ))),
        }
    }
}

/// A single `<time, value>` sample. Values are widened to `f64` once they
/// leave [`ValueBuffer`] since every downstream computation (alignment,
/// ELB, distance) operates in floating point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    /// Timestamp, monotonically non-decreasing within a series.
    pub time: i64,
    /// Sample value, already widened to `f64`.
    pub value: f64,
}

/// Append-only, typed buffer of raw values, paired with their timestamps.
///
/// Internally values are kept in their native width to keep the amortized
/// memory cost faithful to the series' "amortized growth"; callers read them
/// back out as `f64` via [`ValueBuffer::value_at`].
#[derive(Debug, Clone)]
pub enum ValueBuffer {
    /// `i32`-typed series
    Int32(Vec<i32>),
    /// `i64`-typed series
    Int64(Vec<i64>),
    /// `f32`-typed series
    Float32(Vec<f32>),
    /// `f64`-typed series
    Float64(Vec<f64>),
}

impl ValueBuffer {
    /// Creates an empty buffer of the given type.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        match data_type {
            DataType::Int32 => Self::Int32(Vec::new()),
            DataType::Int64 => Self::Int64(Vec::new()),
            DataType::Float32 => Self::Float32(Vec::new()),
            DataType::Float64 => Self::Float64(Vec::new()),
        }
    }

    /// The type this buffer was created with.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
        }
    }

    /// Number of values currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    /// `true` if no values are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads back the value at `idx` widened to `f64`.
    #[must_use]
    pub fn value_at(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Int32(v) => v.get(idx).map(|x| f64::from(*x)),
            Self::Int64(v) => v.get(idx).map(|x| *x as f64),
            Self::Float32(v) => v.get(idx).map(|x| f64::from(*x)),
            Self::Float64(v) => v.get(idx).copied(),
        }
    }

    /// Discards every value strictly before `idx` (amortized O(n) like `Vec::drain`).
    pub fn drain_before(&mut self, idx: usize) {
        match self {
            Self::Int32(v) => {
                v.drain(0..idx.min(v.len()));
            }
            Self::Int64(v) => {
                v.drain(0..idx.min(v.len()));
            }
            Self::Float32(v) => {
                v.drain(0..idx.min(v.len()));
            }
            Self::Float64(v) => {
                v.drain(0..idx.min(v.len()));
            }
        }
    }

    /// Empties the buffer without releasing its allocation, so it can be
    /// reused by the pool.
    pub fn clear(&mut self) {
        match self {
            Self::Int32(v) => v.clear(),
            Self::Int64(v) => v.clear(),
            Self::Float32(v) => v.clear(),
            Self::Float64(v) => v.clear(),
        }
    }

    /// Appends a batch of `f64` samples, narrowing to the buffer's native type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataType`] if a sample cannot be represented losslessly
    /// is never checked here (narrowing follows normal Rust `as` semantics);
    /// this only fails if `data_type` disagrees with the buffer it's called on,
    /// which indicates a caller bug rather than bad data.
    pub fn extend_f64(&mut self, samples: &[f64]) -> Result<()> {
        match self {
            Self::Int32(v) => v.extend(samples.iter().map(|x| *x as i32)),
            Self::Int64(v) => v.extend(samples.iter().map(|x| *x as i64)),
            Self::Float32(v) => {
                #[allow(clippy::cast_possible_truncation)]
                v.extend(samples.iter().map(|x| *x as f32));
            }
            Self::Float64(v) => v.extend_from_slice(samples),
        }
        Ok(())
    }

    /// Byte size of the currently buffered payload, excluding container overhead.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Int32(v) => v.len() * std::mem::size_of::<i32>(),
            Self::Int64(v) => v.len() * std::mem::size_of::<i64>(),
            Self::Float32(v) => v.len() * std::mem::size_of::<f32>(),
            Self::Float64(v) => v.len() * std::mem::size_of::<f64>(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_host_tag() {
        assert!(DataType::from_host_tag(200).is_err());
    }

    #[test]
    fn narrows_and_widens_round_trip() {
        let mut buf = ValueBuffer::new(DataType::Int32);
        buf.extend_f64(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.value_at(1), Some(2.0));
    }

    #[test]
    fn drain_before_discards_prefix() {
        let mut buf = ValueBuffer::new(DataType::Float64);
        buf.extend_f64(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        buf.drain_before(2);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.value_at(0), Some(3.0));
    }
}
