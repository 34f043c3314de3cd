//! Common test utilities and helpers for integration tests

#![allow(dead_code)] // Each test binary uses a different subset

use spillway_core::{
    CancellationToken, ColumnType, Frame, FrameReader, Reader, Schema, ShuffleError,
    ShuffleResult, Spiller, Value,
};
use std::sync::{Arc, Mutex};

/// A single `int64` column.
pub fn int_schema() -> Schema {
    Schema::new(vec![ColumnType::Int64])
}

/// An `int64` key followed by a `utf8` payload.
pub fn keyed_schema() -> Schema {
    Schema::new(vec![ColumnType::Int64, ColumnType::Utf8])
}

pub fn int_frame(values: &[i64]) -> Frame {
    let rows: Vec<Vec<Value>> = values.iter().map(|&v| vec![Value::Int64(v)]).collect();
    Frame::from_rows(int_schema(), &rows).unwrap()
}

pub fn int_source(values: &[i64]) -> FrameReader {
    FrameReader::new(int_frame(values))
}

/// A keyed frame whose payloads are `payload_len` bytes long.
pub fn keyed_frame(keys: &[i64], payload_len: usize) -> Frame {
    let rows: Vec<Vec<Value>> = keys
        .iter()
        .map(|&k| vec![Value::Int64(k), Value::Utf8(payload(k, payload_len))])
        .collect();
    Frame::from_rows(keyed_schema(), &rows).unwrap()
}

fn payload(key: i64, len: usize) -> String {
    let c = (b'a' + (key.rem_euclid(26)) as u8) as char;
    std::iter::repeat_n(c, len).collect()
}

/// Deterministic pseudo-random integers in `[0, bound)`.
pub fn pseudo_random(n: usize, seed: u64, bound: i64) -> Vec<i64> {
    let mut x = seed.max(1);
    (0..n)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x % bound as u64) as i64
        })
        .collect()
}

/// The leading `int64` column of each row.
pub fn keys(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter()
        .map(|r| match r[0] {
            Value::Int64(v) => v,
            ref other => panic!("expected an int64 key, got {:?}", other),
        })
        .collect()
}

/// Number of entries in a directory.
pub fn dir_entries(path: &std::path::Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}

/// Rows and encoded bytes of one spilled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillRecord {
    pub rows: usize,
    pub bytes: usize,
}

/// Wraps a spiller and records every run it writes.
pub struct RecordingSpiller<S> {
    inner: S,
    log: Arc<Mutex<Vec<SpillRecord>>>,
}

impl<S: Spiller> RecordingSpiller<S> {
    pub fn new(inner: S) -> (Self, Arc<Mutex<Vec<SpillRecord>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }
}

impl<S: Spiller> Spiller for RecordingSpiller<S> {
    fn spill(&mut self, frame: &Frame) -> ShuffleResult<usize> {
        let bytes = self.inner.spill(frame)?;
        self.log.lock().unwrap().push(SpillRecord {
            rows: frame.len(),
            bytes,
        });
        Ok(bytes)
    }

    fn readers(&mut self) -> ShuffleResult<Vec<Box<dyn Reader>>> {
        self.inner.readers()
    }

    fn cleanup(&mut self) -> ShuffleResult<()> {
        self.inner.cleanup()
    }
}

/// Serves its inner reader, then fails.
pub struct FailingReader<R> {
    inner: R,
}

impl<R> FailingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Reader> Reader for FailingReader<R> {
    fn read(&mut self, ctx: &CancellationToken, frame: &mut Frame) -> ShuffleResult<usize> {
        match self.inner.read(ctx, frame) {
            Err(ShuffleError::Eof) | Ok(0) => {
                Err(ShuffleError::Source("upstream shard lost".to_string()))
            }
            other => other,
        }
    }
}

/// Cancels `token` after its inner reader has served `after` reads.
pub struct CancellingReader<R> {
    inner: R,
    token: CancellationToken,
    after: usize,
}

impl<R> CancellingReader<R> {
    pub fn new(inner: R, token: CancellationToken, after: usize) -> Self {
        Self {
            inner,
            token,
            after,
        }
    }
}

impl<R: Reader> Reader for CancellingReader<R> {
    fn read(&mut self, ctx: &CancellationToken, frame: &mut Frame) -> ShuffleResult<usize> {
        if self.after == 0 {
            self.token.cancel();
        } else {
            self.after -= 1;
        }
        self.inner.read(ctx, frame)
    }
}
