//! Integration tests for reshuffle
//!
//! These tests build a small operator graph and play the part of the
//! execution layer: upstream shards are partitioned by key into task
//! buffers, each reshuffled shard reads its partition from every upstream
//! task, and the result is sorted.

mod common;

use common::*;
use spillway_core::{
    CancellationToken, ColumnType, ConstSlice, Frame, HashPartitioner, KeySorter, MultiReader,
    Partitioner, Reader, Schema, Scope, ShuffleError, Slice, SortConfig, TaskBuffer, Value,
    read_all, reshuffle, sort_reader,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn word_frame(n: usize) -> Frame {
    let schema = Schema::new(vec![ColumnType::Utf8, ColumnType::Int64]);
    let rows: Vec<Vec<Value>> = pseudo_random(n, 21, 40)
        .into_iter()
        .enumerate()
        .map(|(i, k)| vec![Value::Utf8(format!("key-{:02}", k)), Value::Int64(i as i64)])
        .collect();
    Frame::from_rows(schema, &rows).unwrap()
}

/// Run every upstream shard and partition its output by key, one task
/// buffer per upstream shard.
fn run_map_side(
    ctx: &CancellationToken,
    upstream: &dyn Slice,
    partitioner: &dyn Partitioner,
) -> Vec<TaskBuffer> {
    let schema = upstream.schema().clone();
    (0..upstream.num_shards())
        .map(|shard| {
            let mut reader = upstream.reader(shard, Vec::new()).unwrap();
            let rows = read_all(ctx, &mut reader, &schema, 17).unwrap();
            let frame = Frame::from_rows(schema.clone(), &rows).unwrap();
            let mut buffer = TaskBuffer::new(partitioner.num_partitions());
            for (p, part) in partitioner.partition_frame(&frame).unwrap().into_iter().enumerate() {
                buffer.append(p, part).unwrap();
            }
            buffer
        })
        .collect()
}

/// The shuffled input of one output shard.
fn shuffle_reader(tasks: &[TaskBuffer], shard: usize) -> Box<dyn Reader> {
    let readers: Vec<Box<dyn Reader>> = tasks
        .iter()
        .map(|t| Box::new(t.reader(Scope::Partition(shard)).unwrap()) as Box<dyn Reader>)
        .collect();
    Box::new(MultiReader::new(readers))
}

#[test]
fn test_reshuffle_groups_keys_by_shard() {
    let ctx = CancellationToken::new();
    let input = word_frame(600);
    let upstream: Arc<dyn Slice> = Arc::new(ConstSlice::new(3, input.clone()).unwrap());
    let node = reshuffle(upstream.clone()).unwrap();
    let dep = node.dep(0).unwrap();
    assert!(dep.shuffle);
    assert!(dep.combiner.is_none());

    let partitioner = HashPartitioner::new(node.num_shards());
    let tasks = run_map_side(&ctx, dep.slice.as_ref(), &partitioner);
    let schema = node.schema().clone();
    let config = SortConfig::builder()
        .canary_rows(32)
        .min_batch_rows(16)
        .spill_target_bytes(512)
        .in_memory()
        .build()
        .unwrap();

    let mut owner: HashMap<String, usize> = HashMap::new();
    let mut seen = Vec::new();
    for shard in 0..node.num_shards() {
        let mut reader = node.reader(shard, vec![shuffle_reader(&tasks, shard)]).unwrap();
        let sorter = Arc::new(KeySorter::for_schema(&schema));
        let mut sorted = sort_reader(&ctx, sorter, &config, &schema, &mut reader).unwrap();
        let rows = read_all(&ctx, &mut sorted, &schema, 64).unwrap();

        let keys: Vec<String> = rows
            .iter()
            .map(|r| match &r[0] {
                Value::Utf8(k) => k.clone(),
                other => panic!("unexpected key {:?}", other),
            })
            .collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        for key in keys.iter().collect::<HashSet<_>>() {
            let prev = owner.insert(key.clone(), shard);
            assert!(prev.is_none(), "key {} read by two shards", key);
        }
        seen.extend(rows);
    }

    let mut expected = input.rows();
    let by_id = |r: &Vec<Value>| match r[1] {
        Value::Int64(i) => i,
        _ => unreachable!(),
    };
    expected.sort_by_key(by_id);
    seen.sort_by_key(by_id);
    assert_eq!(seen, expected);
}

#[test]
fn test_task_buffer_offsets_match_partitioned_rows() {
    let ctx = CancellationToken::new();
    let input = word_frame(90);
    let partitioner = HashPartitioner::with_seed(4, 99);
    let upstream = ConstSlice::new(1, input).unwrap();
    let tasks = run_map_side(&ctx, &upstream, &partitioner);
    let task = &tasks[0];

    for p in 0..task.num_partitions() {
        let mut reader = task.reader(Scope::Partition(p)).unwrap();
        let rows = read_all(&ctx, &mut reader, upstream.schema(), 5).unwrap();
        assert_eq!(rows.len(), task.num_rows(Scope::Partition(p)).unwrap());
        for (o, row) in rows.iter().enumerate() {
            let (frame, i) = task.slice(Scope::Partition(p), o).unwrap().unwrap();
            assert_eq!(&frame.row(i), row);
        }
        assert!(task.slice(Scope::Partition(p), rows.len()).unwrap().is_none());
    }
    assert_eq!(task.num_rows(Scope::All).unwrap(), 90);
}

#[test]
fn test_reshuffle_of_unkeyed_schema_builds_nothing() {
    let floats = Schema::new(vec![ColumnType::Float64]);
    let upstream: Arc<dyn Slice> = Arc::new(ConstSlice::new(2, Frame::new(floats, 3)).unwrap());
    let err = reshuffle(upstream.clone()).err().unwrap();
    assert!(matches!(err, ShuffleError::Type { .. }));
    assert!(err.is_fatal());
    assert!(err.to_string().starts_with("reshuffle:"));
    // Only the test's handle remains.
    assert_eq!(Arc::strong_count(&upstream), 1);

    let no_key = Schema::new(vec![ColumnType::Int64]).with_prefix(0);
    let upstream: Arc<dyn Slice> = Arc::new(ConstSlice::new(1, Frame::new(no_key, 1)).unwrap());
    assert!(reshuffle(upstream).is_err());
}
