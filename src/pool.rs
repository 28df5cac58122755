// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Process-wide buffer pool shared by every index instance.
//!
//! Allocation is non-blocking: the pool simply grows on demand when empty.
//! Release is a hand-back. Per the design notes, the pool is an explicit,
//! passed-around `Arc<BufferPool>`, never a hidden global singleton.

use crate::buffer::{DataType, ValueBuffer};
use rustc_hash::FxHashMap;
use std::sync::Mutex;

/// A shared, per-datatype free list of recycled [`ValueBuffer`]s and
/// aligned-sequence scratch buffers.
#[derive(Default)]
pub struct BufferPool {
    values: Mutex<FxHashMap<DataType, Vec<ValueBuffer>>>,
    aligned: Mutex<Vec<Vec<f64>>>,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a recycled buffer of the given type, or allocates a fresh one.
    pub fn acquire_values(&self, data_type: DataType) -> ValueBuffer {
        #[allow(clippy::expect_used)]
        let mut free = self.values.lock().expect("pool mutex poisoned");
        free.get_mut(&data_type)
            .and_then(Vec::pop)
            .unwrap_or_else(|| ValueBuffer::new(data_type))
    }

    /// Hands a buffer back to the pool after clearing it.
    pub fn release_values(&self, mut buf: ValueBuffer) {
        buf.clear();
        let data_type = buf.data_type();
        #[allow(clippy::expect_used)]
        let mut free = self.values.lock().expect("pool mutex poisoned");
        free.entry(data_type).or_default().push(buf);
    }

    /// Takes a recycled aligned-sequence buffer with at least `capacity_hint`
    /// capacity, or allocates a fresh one.
    pub fn acquire_aligned(&self, capacity_hint: usize) -> Vec<f64> {
        #[allow(clippy::expect_used)]
        let mut free = self.aligned.lock().expect("pool mutex poisoned");
        free.pop().unwrap_or_else(|| Vec::with_capacity(capacity_hint))
    }

    /// Hands an aligned-sequence buffer back to the pool after clearing it.
    pub fn release_aligned(&self, mut buf: Vec<f64>) {
        buf.clear();
        #[allow(clippy::expect_used)]
        let mut free = self.aligned.lock().expect("pool mutex poisoned");
        free.push(buf);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_recycles_allocation() {
        let pool = BufferPool::new();
        let buf = pool.acquire_values(DataType::Float64);
        assert!(buf.is_empty());
        pool.release_values(buf);

        let buf2 = pool.acquire_values(DataType::Float64);
        assert_eq!(buf2.data_type(), DataType::Float64);
    }

    #[test]
    fn aligned_pool_round_trips() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire_aligned(4);
        buf.extend_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        pool.release_aligned(buf);

        let buf2 = pool.acquire_aligned(4);
        assert!(buf2.is_empty());
    }
}
