// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::TimeFilter;
use crate::align::align_uniform;
use crate::buffer::{DataType, ValueBuffer};
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::window::Identifier;
use std::sync::Arc;

/// Configuration for a [`CountFixedPreprocessor`].
#[derive(Clone, Debug)]
pub struct CountFixedConfig {
    /// The series' numeric data type.
    pub data_type: DataType,
    /// `W`: window length in points.
    pub window_range: u32,
    /// `S`: slide step in points. Defaults to `W`.
    pub slide_step: u32,
    /// Whether to keep the current chunk's [`Identifier`] list in memory.
    pub store_identifier: bool,
    /// Whether `process_next` also materializes the L2 aligned sequence.
    pub store_aligned: bool,
}

/// Sliding-window preprocessor over an append-only `<time, value>` source
///. Strictly sequential, cooperative, single-threaded: no
/// partial windows are ever emitted, and `process_next` must follow a
/// successful `has_next`.
pub struct CountFixedPreprocessor {
    config: CountFixedConfig,
    pool: Arc<BufferPool>,

    times: Vec<i64>,
    values: ValueBuffer,

    /// Count of windows already frozen into completed chunks before the
    /// current, in-progress chunk.
    flushed_offset: u64,
    /// Windows emitted in the *current* chunk; reset to 0 by `clear`.
    slice_num: u32,
    /// Index into `times`/`values` of the next window's first point.
    current_start_idx: usize,

    chunk_start: Option<i64>,
    chunk_end: Option<i64>,

    identifiers: Vec<Identifier>,

    /// The window staged by the last successful `has_next`, awaiting
    /// `process_next`.
    staged: Option<usize>,

    closed: bool,
}

impl CountFixedPreprocessor {
    /// Creates a new preprocessor. `slide_step` of `0` is normalized to `window_range`.
    #[must_use]
    pub fn new(mut config: CountFixedConfig, pool: Arc<BufferPool>) -> Self {
        if config.slide_step == 0 {
            config.slide_step = config.window_range;
        }
        let values = ValueBuffer::new(config.data_type);
        Self {
            config,
            pool,
            times: Vec::new(),
            values,
            flushed_offset: 0,
            slice_num: 0,
            current_start_idx: 0,
            chunk_start: None,
            chunk_end: None,
            identifiers: Vec::new(),
            staged: None,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Appends a batch of points to the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the preprocessor has already failed or
    /// been released.
    pub fn append(&mut self, times: &[i64], values: &[f64]) -> Result<()> {
        self.ensure_open()?;
        debug_assert_eq!(times.len(), values.len());
        self.times.extend_from_slice(times);
        self.values.extend_f64(values)?;
        Ok(())
    }

    /// Number of windows emitted so far in the current (unflushed) chunk.
    #[must_use]
    pub fn slice_num(&self) -> u32 {
        self.slice_num
    }

    /// Number of windows frozen into chunks prior to the current one.
    #[must_use]
    pub fn flushed_offset(&self) -> u64 {
        self.flushed_offset
    }

    /// Time bounds of the current, in-progress chunk, if any window has
    /// been emitted yet.
    #[must_use]
    pub fn chunk_bounds(&self) -> Option<(i64, i64)> {
        match (self.chunk_start, self.chunk_end) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    /// The identifiers emitted so far in the current chunk, if
    /// `store_identifier` is enabled.
    #[must_use]
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// `true` if at least `W` points remain ahead of the cursor and the next
    /// eligible window's start time satisfies `filter`.
    ///
    /// Rejected windows (the slice exists but `filter` refuses it) are
    /// skipped by advancing the cursor by `S`, without emitting - this is a
    /// mutating peek, not a pure predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the preprocessor is closed.
    pub fn has_next(&mut self, filter: &dyn TimeFilter) -> Result<bool> {
        self.ensure_open()?;

        let w = self.config.window_range as usize;

        loop {
            if self.current_start_idx + w > self.times.len() {
                self.staged = None;
                return Ok(false);
            }

            let Some(&start_time) = self.times.get(self.current_start_idx) else {
                self.staged = None;
                return Ok(false);
            };

            if filter.allows(start_time) {
                self.staged = Some(self.current_start_idx);
                return Ok(true);
            }

            self.current_start_idx += self.config.slide_step as usize;
        }
    }

    /// Materializes the window staged by the last successful `has_next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the preprocessor is closed, or a
    /// [`Error::Fatal`] if called without a preceding successful `has_next`
    /// (spec: "must be called after a successful `hasNext`").
    pub fn process_next(&mut self) -> Result<(Identifier, Vec<f64>)> {
        self.ensure_open()?;

        let start = self.staged.take().ok_or(Error::Fatal(
            crate::error::Invariant::MonotoneWindows,
        ))?;

        let w = self.config.window_range as usize;
        let end = start + w;

        if end > self.times.len() {
            self.closed = true;
            return Err(Error::Fatal(crate::error::Invariant::MonotoneWindows));
        }

        let window_times = self.times.get(start..end).unwrap_or(&[]);
        let mut window_values = Vec::with_capacity(w);
        for i in start..end {
            window_values.push(self.values.value_at(i).unwrap_or(0.0));
        }

        #[allow(clippy::expect_used)]
        let start_time = *window_times.first().expect("window is non-empty");
        #[allow(clippy::expect_used)]
        let end_time = *window_times.last().expect("window is non-empty");

        let id = Identifier::new(start_time, end_time, w as u32);

        self.chunk_start = Some(self.chunk_start.map_or(start_time, |s| s.min(start_time)));
        self.chunk_end = Some(self.chunk_end.map_or(end_time, |e| e.max(end_time)));

        if self.config.store_identifier {
            self.identifiers.push(id);
        }

        self.slice_num += 1;
        self.current_start_idx += self.config.slide_step as usize;

        Ok((id, window_values))
    }

    /// Returns a pooled, nearest-neighbour resampled aligned sequence for
    /// the window most recently returned by `process_next`.
    ///
    /// Only meaningful when `store_aligned` is enabled; the caller must
    /// return the buffer via [`BufferPool::release_aligned`] when done.
    #[must_use]
    pub fn align_window(&self, window_times: &[i64], window_values: &[f64], aligned_size: usize) -> Vec<f64> {
        let mut buf = self.pool.acquire_aligned(aligned_size);
        buf.extend(align_uniform(window_times, window_values, aligned_size));
        buf
    }

    /// Discards points strictly before the cursor, compacting the buffer.
    pub fn clear_processed_src_data(&mut self) {
        if self.current_start_idx == 0 {
            return;
        }
        self.times.drain(0..self.current_start_idx);
        self.values.drain_before(self.current_start_idx);
        self.current_start_idx = 0;
    }

    /// Freezes `slice_num` into `flushed_offset`, then compacts buffers and
    /// resets the per-chunk cursor state, ready for the next chunk.
    pub fn clear(&mut self) {
        self.clear_processed_src_data();
        self.flushed_offset += u64::from(self.slice_num);
        self.slice_num = 0;
        self.chunk_start = None;
        self.chunk_end = None;
        self.identifiers.clear();
        self.staged = None;
    }

    /// Returns the buffer to the pool and enters the terminal closed state.
    pub fn close_and_release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let buf = std::mem::replace(&mut self.values, ValueBuffer::new(self.config.data_type));
        self.pool.release_values(buf);
        self.times.clear();
    }

    /// `true` once this preprocessor has entered its terminal closed state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::preprocessor::Unfiltered;

    fn config(w: u32, s: u32) -> CountFixedConfig {
        CountFixedConfig {
            data_type: DataType::Float64,
            window_range: w,
            slide_step: s,
            store_identifier: true,
            store_aligned: false,
        }
    }

    #[test]
    fn emits_expected_window_count_p5() {
        let pool = Arc::new(BufferPool::new());
        let mut pp = CountFixedPreprocessor::new(config(3, 1), pool);
        let times: Vec<i64> = (0..10).collect();
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        pp.append(&times, &values).unwrap();

        let mut count = 0;
        while pp.has_next(&Unfiltered).unwrap() {
            pp.process_next().unwrap();
            count += 1;
        }
        // P5: floor((10-3)/1) + 1 = 8
        assert_eq!(count, 8);
    }

    #[test]
    fn windows_are_monotone_i1() {
        let pool = Arc::new(BufferPool::new());
        let mut pp = CountFixedPreprocessor::new(config(4, 2), pool);
        let times: Vec<i64> = (0..20).step_by(1).collect();
        let values: Vec<f64> = times.iter().map(|&t| t as f64).collect();
        pp.append(&times, &values).unwrap();

        let mut starts = vec![];
        while pp.has_next(&Unfiltered).unwrap() {
            let (id, _) = pp.process_next().unwrap();
            starts.push(id.start_time);
        }
        for w in starts.windows(2) {
            assert_eq!(w[1] - w[0], 2);
        }
    }

    #[test]
    fn sub_flush_boundary_resets_slice_num() {
        let pool = Arc::new(BufferPool::new());
        let mut pp = CountFixedPreprocessor::new(config(3, 1), pool);
        let times: Vec<i64> = (0..10).collect();
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        pp.append(&times, &values).unwrap();

        let mut first_chunk = vec![];
        for _ in 0..3 {
            assert!(pp.has_next(&Unfiltered).unwrap());
            first_chunk.push(pp.process_next().unwrap().0);
        }
        assert_eq!(pp.slice_num(), 3);
        pp.clear();
        assert_eq!(pp.slice_num(), 0);
        assert_eq!(pp.flushed_offset(), 3);

        let mut second_chunk = vec![];
        while pp.has_next(&Unfiltered).unwrap() {
            second_chunk.push(pp.process_next().unwrap().0);
        }
        assert_eq!(first_chunk.len() + second_chunk.len(), 8);

        // start times strictly monotonic across the boundary
        let last_first = first_chunk.last().unwrap().start_time;
        let first_second = second_chunk.first().unwrap().start_time;
        assert!(first_second > last_first);
    }

    #[test]
    fn closed_preprocessor_rejects_calls() {
        let pool = Arc::new(BufferPool::new());
        let mut pp = CountFixedPreprocessor::new(config(3, 1), pool);
        pp.close_and_release();
        assert!(pp.append(&[1], &[1.0]).is_err());
        assert!(pp.has_next(&Unfiltered).is_err());
    }
}
