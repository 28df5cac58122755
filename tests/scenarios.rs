// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! End-to-end coverage of the index's lifecycle scenarios, driven entirely
//! through the public API.

use simsearch_index::{
    buffer::DataType, config::IndexConfigBuilder, query::{IndexChunkMeta, QueryReader, TimeRange},
    DistanceKind, Identifier, MBRIndex, Metrics, QueryConfig,
};
use std::sync::Arc;

fn fresh_index(window_range: u32, max_entries: usize, min_entries: usize) -> MBRIndex {
    let config = IndexConfigBuilder::new(DataType::Float64, window_range)
        .feature_dim(2)
        .max_entries(max_entries)
        .min_entries(min_entries)
        .build()
        .expect("valid config");
    MBRIndex::new(config, Arc::new(simsearch_index::BufferPool::new()), Arc::new(Metrics::new()))
}

// Scenario 1: a fixed-count preprocessor emits one window per `window_range`
// points appended, and every emitted window lands in the R-tree.
#[test]
fn scenario_1_builds_one_window_per_slide() {
    let mut index = fresh_index(4, 8, 2);
    let times: Vec<i64> = (0..16).collect();
    let values: Vec<f64> = (0..16).map(|i| i as f64).collect();

    index.append(&times, &values).expect("append");
    let mut built = 0;
    while index.build_next().expect("build_next") {
        built += 1;
    }

    assert_eq!(built, 4, "16 points / window_range 4 = 4 non-overlapping windows");
}

// Scenario 2/3: forcing enough windows to split a node repeatedly still
// returns every inserted window from a flushed-and-reloaded chunk.
#[test]
fn scenario_2_split_preserves_every_window() {
    let mut index = fresh_index(4, 4, 1);
    let n = 400;
    let times: Vec<i64> = (0..n).collect();
    let values: Vec<f64> = (0..n).map(|i| (i % 7) as f64).collect();

    index.append(&times, &values).expect("append");
    while index.build_next().expect("build_next") {}

    let chunk = index.flush("chunk-split");

    let query = QueryConfig::new(vec![0.0, 1.0, 2.0, 3.0]).with_threshold(f64::INFINITY);
    let candidates = index.query_by_index(&chunk.body, &query).expect("query");
    assert_eq!(candidates.len(), (n as usize) / 4, "infinite threshold returns every window");
}

// Scenario 4: flush does not reset the tree, so windows built before a
// flush are still queryable after more data is appended and built.
#[test]
fn scenario_4_flush_does_not_clear_sub_flush_state() {
    let mut index = fresh_index(4, 8, 2);
    index.append(&(0..8).collect::<Vec<_>>(), &[0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0]).unwrap();
    while index.build_next().unwrap() {}
    let before = index.amortized_size();

    let _chunk_a = index.flush("a");
    assert_eq!(index.amortized_size(), before, "flush must not reset the tree");

    index.append(&(8..16).collect::<Vec<_>>(), &[0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0]).unwrap();
    while index.build_next().unwrap() {}
    assert!(index.amortized_size() > before, "more windows were added after the flush");
}

// Scenario 5: a QueryReader skips chunks whose span can't intersect the
// allowed range, without ever deserializing them.
#[test]
fn scenario_5_pruned_chunks_are_never_scanned() {
    let allowed = TimeRange::single(1_000, 2_000);
    let mut reader = QueryReader::new(allowed, Arc::new(Metrics::new()));

    reader
        .update_index_chunks(IndexChunkMeta { path: "old".into(), start_time: 0, end_time: 500 })
        .unwrap();
    reader
        .update_index_chunks(IndexChunkMeta { path: "current".into(), start_time: 1_500, end_time: 1_600 })
        .unwrap();

    let next = reader.next_chunk().unwrap().expect("one chunk survives pruning");
    assert_eq!(next.path, "current");
    assert!(reader.next_chunk().unwrap().is_none());
}

// Scenario 6: a builder given min_entries > max_entries swaps them instead
// of failing.
#[test]
fn scenario_6_inverted_entries_are_swapped_not_rejected() {
    let config = IndexConfigBuilder::new(DataType::Float64, 4)
        .feature_dim(2)
        .max_entries(2)
        .min_entries(8)
        .build()
        .expect("builder self-heals instead of erroring");

    assert!(config.min_entries <= config.max_entries);
}

#[test]
fn exact_distance_post_process_rejects_dissimilar_candidates() {
    let mut index = fresh_index(4, 8, 2);
    index
        .append(&(0..8).collect::<Vec<_>>(), &[0.0, 1.0, 2.0, 3.0, 100.0, 101.0, 102.0, 103.0])
        .unwrap();
    while index.build_next().unwrap() {}

    let chunk = index.flush("chunk-distance");
    let query = QueryConfig::new(vec![0.0, 1.0, 2.0, 3.0]).with_threshold(f64::INFINITY);
    let candidates = index.query_by_index(&chunk.body, &query).unwrap();

    let raw_by_id = |id: Identifier| -> simsearch_index::Result<Vec<f64>> {
        Ok(if id.start_time == 0 {
            vec![0.0, 1.0, 2.0, 3.0]
        } else {
            vec![100.0, 101.0, 102.0, 103.0]
        })
    };

    let mut reader = QueryReader::new(TimeRange::full(), Arc::new(Metrics::new()));
    let kept = reader
        .append_data_and_post_process(&candidates, &[0.0, 1.0, 2.0, 3.0], DistanceKind::Euclidean, 0.5, raw_by_id)
        .unwrap();

    assert_eq!(kept, vec![Identifier::new(0, 3, 4)]);
}
