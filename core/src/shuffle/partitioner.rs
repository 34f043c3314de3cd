//! Defines partitioners for distributing rows in a shuffle.

use crate::error::ShuffleResult;
use crate::frame::Frame;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// Assigns each row of a frame to an output shard.
pub trait Partitioner: Send + Sync + Debug {
    fn num_partitions(&self) -> usize;

    /// The shard of row `row` of `frame`.
    fn partition(&self, frame: &Frame, row: usize) -> usize;

    /// Split `frame` into one frame per shard, preserving row order within
    /// each shard.
    fn partition_frame(&self, frame: &Frame) -> ShuffleResult<Vec<Frame>> {
        let mut shards: Vec<Vec<usize>> = vec![Vec::new(); self.num_partitions()];
        for row in 0..frame.len() {
            shards[self.partition(frame, row)].push(row);
        }
        shards
            .into_iter()
            .map(|rows| {
                let mut out = Frame::new(frame.schema().clone(), rows.len());
                for (i, &row) in rows.iter().enumerate() {
                    out.copy_row(i, frame, row)?;
                }
                Ok(out)
            })
            .collect()
    }
}

/// A partitioner that uses the hash of a row's key columns.
#[derive(Clone, Debug)]
pub struct HashPartitioner {
    num_partitions: usize,
    seed: u64,
}

impl HashPartitioner {
    pub fn new(num_partitions: usize) -> Self {
        Self::with_seed(num_partitions, 0)
    }

    pub fn with_seed(num_partitions: usize, seed: u64) -> Self {
        assert!(num_partitions > 0, "Number of partitions must be positive.");
        Self {
            num_partitions,
            seed,
        }
    }
}

impl Partitioner for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn partition(&self, frame: &Frame, row: usize) -> usize {
        let mut s = DefaultHasher::new();
        self.seed.hash(&mut s);
        frame.hash_key(row, &mut s);
        (s.finish() % self.num_partitions as u64) as usize
    }
}
