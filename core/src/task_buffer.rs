//! Partitioned in-memory task output.
//!
//! A [`TaskBuffer`] holds the frames a task produced, grouped by output
//! partition in append order. Frames are shared once appended and are never
//! mutated again, so readers and offset lookups hand out views without
//! copying.

use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::reader::Reader;
use crate::types::Schema;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which rows of a task buffer to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every partition, in partition order.
    All,
    Partition(usize),
}

/// Frames grouped by partition. Every frame shares the column kinds of the
/// first one appended.
#[derive(Debug, Clone, Default)]
pub struct TaskBuffer {
    partitions: Vec<Vec<Arc<Frame>>>,
    schema: Option<Schema>,
}

impl TaskBuffer {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
            schema: None,
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Append a frame to the end of `partition`.
    pub fn append(&mut self, partition: usize, frame: Frame) -> ShuffleResult<()> {
        let n = self.partitions.len();
        let frames = self.partitions.get_mut(partition).ok_or_else(|| {
            ShuffleError::precondition(format!(
                "partition {} out of range for task buffer with {} partitions",
                partition, n
            ))
        })?;
        let schema = self.schema.get_or_insert_with(|| frame.schema().clone());
        if schema.columns() != frame.schema().columns() {
            return Err(ShuffleError::precondition(format!(
                "cannot append a frame of {} to a task buffer of {}",
                frame.schema(),
                schema
            )));
        }
        frames.push(Arc::new(frame));
        Ok(())
    }

    fn frames(&self, scope: Scope) -> ShuffleResult<&[Vec<Arc<Frame>>]> {
        match scope {
            Scope::All => Ok(self.partitions.as_slice()),
            Scope::Partition(p) if p < self.partitions.len() => {
                Ok(&self.partitions[p..p + 1])
            }
            Scope::Partition(p) => Err(ShuffleError::precondition(format!(
                "partition {} out of range for task buffer with {} partitions",
                p,
                self.partitions.len()
            ))),
        }
    }

    /// Total rows in `scope`.
    pub fn num_rows(&self, scope: Scope) -> ShuffleResult<usize> {
        Ok(self
            .frames(scope)?
            .iter()
            .flatten()
            .map(|f| f.len())
            .sum())
    }

    /// Locate the row at `offset` within `scope`.
    ///
    /// Returns the frame holding it and the row's offset in that frame, or
    /// `None` once `offset` is past the last row.
    pub fn slice(&self, scope: Scope, offset: usize) -> ShuffleResult<Option<(&Frame, usize)>> {
        let mut base = 0;
        for frame in self.frames(scope)?.iter().flatten() {
            if offset < base + frame.len() {
                return Ok(Some((frame.as_ref(), offset - base)));
            }
            base += frame.len();
        }
        Ok(None)
    }

    /// A sequential reader over `scope`.
    pub fn reader(&self, scope: Scope) -> ShuffleResult<TaskBufferReader> {
        let partitions = self.frames(scope)?.to_vec();
        Ok(TaskBufferReader {
            partitions,
            partition: 0,
            frame: 0,
            row: 0,
        })
    }
}

/// Reads a task buffer scope in append order.
///
/// The reader holds its own references to the frames, so later appends to
/// the buffer are not observed.
#[derive(Debug)]
pub struct TaskBufferReader {
    partitions: Vec<Vec<Arc<Frame>>>,
    partition: usize,
    frame: usize,
    row: usize,
}

impl Reader for TaskBufferReader {
    fn read(&mut self, ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
        if ctx.is_cancelled() {
            return Err(ShuffleError::Cancelled);
        }
        let max = out.len();
        let mut n = 0;
        while n < max && self.partition < self.partitions.len() {
            let frames = &self.partitions[self.partition];
            if self.frame == frames.len() {
                self.partition += 1;
                self.frame = 0;
                continue;
            }
            let src = &frames[self.frame];
            if self.row == src.len() {
                self.frame += 1;
                self.row = 0;
                continue;
            }
            let m = (max - n).min(src.len() - self.row);
            for i in 0..m {
                out.copy_row(n + i, src, self.row + i)?;
            }
            n += m;
            self.row += m;
        }
        if n == 0 {
            return Err(ShuffleError::Eof);
        }
        Ok(n)
    }
}
