//! Spilling sorted frames to run storage.
//!
//! Each spilled frame becomes one run: a small header followed by chunks of
//! at most `chunk_rows` rows, each encoded with bincode. Run readers decode a
//! chunk at a time, so reading a run keeps only one chunk in memory.

use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::{Column, Frame};
use crate::reader::Reader;
use crate::types::Schema;
use serde::{Deserialize, Serialize};
use spillway_common::{
    CommonError, RunId, RunStorage, RunStorageBackend, RunStorageBuilder, RunStorageStats,
};
use std::io::Read;
use std::ops::{Deref, DerefMut};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Persists sorted frames as runs and reads them back.
pub trait Spiller: Send {
    /// Persist `frame` as one run, returning the number of bytes written.
    fn spill(&mut self, frame: &Frame) -> ShuffleResult<usize>;

    /// One reader per run, in spill order. Must only be called once all
    /// spilling is complete.
    fn readers(&mut self) -> ShuffleResult<Vec<Box<dyn Reader>>>;

    /// Release every run. Idempotent.
    fn cleanup(&mut self) -> ShuffleResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RunHeader {
    rows: u64,
    chunks: u64,
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// A [`Spiller`] that encodes frames into a [`RunStorage`].
#[derive(Debug)]
pub struct FrameSpiller {
    schema: Schema,
    storage: Box<dyn RunStorage>,
    chunk_rows: usize,
    sealed: bool,
}

impl FrameSpiller {
    /// Create a spiller backed by a fresh storage scope.
    pub fn new(schema: Schema, backend: RunStorageBackend, chunk_rows: usize) -> ShuffleResult<Self> {
        let storage = RunStorageBuilder::new().backend(backend).build()?;
        Ok(Self::with_storage(schema, storage, chunk_rows))
    }

    pub fn with_storage(schema: Schema, storage: Box<dyn RunStorage>, chunk_rows: usize) -> Self {
        Self {
            schema,
            storage,
            chunk_rows: chunk_rows.max(1),
            sealed: false,
        }
    }

    pub fn num_runs(&self) -> usize {
        self.storage.num_runs()
    }

    pub fn stats(&self) -> RunStorageStats {
        self.storage.stats()
    }

    fn encode(&self, frame: &Frame) -> ShuffleResult<Vec<u8>> {
        let rows = frame.len();
        let header = RunHeader {
            rows: rows as u64,
            chunks: rows.div_ceil(self.chunk_rows) as u64,
        };
        let mut buf = Vec::new();
        bincode::serde::encode_into_std_write(&header, &mut buf, bincode_config()).map_err(
            |e| CommonError::serialization_error_with_source("Failed to encode run header", e),
        )?;
        let mut lo = 0;
        while lo < rows {
            let hi = (lo + self.chunk_rows).min(rows);
            let chunk = frame.columns_range(lo, hi);
            bincode::serde::encode_into_std_write(&chunk, &mut buf, bincode_config()).map_err(
                |e| CommonError::serialization_error_with_source("Failed to encode run chunk", e),
            )?;
            lo = hi;
        }
        Ok(buf)
    }
}

impl Spiller for FrameSpiller {
    fn spill(&mut self, frame: &Frame) -> ShuffleResult<usize> {
        if self.sealed {
            return Err(ShuffleError::precondition(
                "cannot spill after run readers were opened",
            ));
        }
        if frame.schema() != &self.schema {
            return Err(ShuffleError::precondition(format!(
                "cannot spill a frame of {} into runs of {}",
                frame.schema(),
                self.schema
            )));
        }
        let bytes = self.encode(frame)?;
        let id = self.storage.put_run(&bytes)?;
        trace!(run = id, rows = frame.len(), bytes = bytes.len(), "Spilled run");
        Ok(bytes.len())
    }

    fn readers(&mut self) -> ShuffleResult<Vec<Box<dyn Reader>>> {
        self.sealed = true;
        (0..self.storage.num_runs())
            .map(|id| -> ShuffleResult<Box<dyn Reader>> {
                let source = self.storage.open_run(id)?;
                Ok(Box::new(RunReader::new(id, self.schema.clone(), source)))
            })
            .collect()
    }

    fn cleanup(&mut self) -> ShuffleResult<()> {
        self.sealed = true;
        self.storage.cleanup()?;
        Ok(())
    }
}

/// Sequential reader over one spilled run.
pub struct RunReader {
    id: RunId,
    schema: Schema,
    source: Box<dyn Read + Send>,
    remaining: Option<u64>,
    chunk: Frame,
    off: usize,
}

impl RunReader {
    fn new(id: RunId, schema: Schema, source: Box<dyn Read + Send>) -> Self {
        let chunk = Frame::empty(schema.clone());
        Self {
            id,
            schema,
            source,
            remaining: None,
            chunk,
            off: 0,
        }
    }

    /// Decode the next chunk. Returns false once the run is exhausted.
    fn next_chunk(&mut self) -> ShuffleResult<bool> {
        let remaining = match self.remaining {
            Some(n) => n,
            None => {
                let header: RunHeader =
                    bincode::serde::decode_from_std_read(&mut self.source, bincode_config())
                        .map_err(|e| {
                            CommonError::deserialization_error_with_source(
                                format!("Failed to decode header of run {}", self.id),
                                e,
                            )
                        })?;
                header.chunks
            }
        };
        if remaining == 0 {
            self.remaining = Some(0);
            return Ok(false);
        }
        let columns: Vec<Column> =
            bincode::serde::decode_from_std_read(&mut self.source, bincode_config()).map_err(
                |e| {
                    CommonError::deserialization_error_with_source(
                        format!("Failed to decode chunk of run {}", self.id),
                        e,
                    )
                },
            )?;
        self.chunk = Frame::from_columns(self.schema.clone(), columns)?;
        self.off = 0;
        self.remaining = Some(remaining - 1);
        Ok(true)
    }
}

impl Reader for RunReader {
    fn read(&mut self, ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
        if ctx.is_cancelled() {
            return Err(ShuffleError::Cancelled);
        }
        while self.off == self.chunk.len() {
            if !self.next_chunk()? {
                return Err(ShuffleError::Eof);
            }
        }
        let n = out.len().min(self.chunk.len() - self.off);
        for i in 0..n {
            out.copy_row(i, &self.chunk, self.off + i)?;
        }
        self.off += n;
        Ok(n)
    }
}

/// Scoped ownership of a spiller: its runs are released when the guard is
/// dropped, whichever way the owning scope is left.
pub struct SpillGuard {
    spiller: Box<dyn Spiller>,
}

impl SpillGuard {
    pub fn new(spiller: Box<dyn Spiller>) -> Self {
        Self { spiller }
    }
}

impl Deref for SpillGuard {
    type Target = dyn Spiller;

    fn deref(&self) -> &Self::Target {
        self.spiller.as_ref()
    }
}

impl DerefMut for SpillGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.spiller.as_mut()
    }
}

impl Drop for SpillGuard {
    fn drop(&mut self) {
        match self.spiller.cleanup() {
            Ok(()) => debug!("Released spill storage"),
            Err(e) => warn!("Failed to release spill storage: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_all;
    use crate::types::{ColumnType, Value};

    fn schema() -> Schema {
        Schema::new(vec![ColumnType::Int64, ColumnType::Utf8])
    }

    fn frame(n: i64) -> Frame {
        let rows: Vec<Vec<Value>> = (0..n)
            .map(|i| vec![Value::Int64(i), Value::Utf8(format!("row-{}", i))])
            .collect();
        Frame::from_rows(schema(), &rows).unwrap()
    }

    #[test]
    fn test_spill_and_read_back() {
        let ctx = CancellationToken::new();
        let mut spiller = FrameSpiller::new(schema(), RunStorageBackend::Memory, 3).unwrap();
        let first = spiller.spill(&frame(7)).unwrap();
        let second = spiller.spill(&frame(2)).unwrap();
        assert!(first > second);
        assert_eq!(spiller.num_runs(), 2);
        assert_eq!(spiller.stats().bytes_written as usize, first + second);

        let mut readers = spiller.readers().unwrap();
        assert_eq!(readers.len(), 2);
        let rows = read_all(&ctx, readers[0].as_mut(), &schema(), 2).unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[6], vec![Value::Int64(6), Value::from("row-6")]);
        let rows = read_all(&ctx, readers[1].as_mut(), &schema(), 16).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_empty_run() {
        let ctx = CancellationToken::new();
        let mut spiller = FrameSpiller::new(schema(), RunStorageBackend::Memory, 4).unwrap();
        spiller.spill(&Frame::empty(schema())).unwrap();
        let mut readers = spiller.readers().unwrap();
        let mut out = Frame::new(schema(), 4);
        assert!(readers[0].read(&ctx, &mut out).unwrap_err().is_eof());
        assert!(readers[0].read(&ctx, &mut out).unwrap_err().is_eof());
    }

    #[test]
    fn test_spill_after_readers_is_rejected() {
        let mut spiller = FrameSpiller::new(schema(), RunStorageBackend::Memory, 4).unwrap();
        spiller.spill(&frame(1)).unwrap();
        spiller.readers().unwrap();
        assert!(matches!(
            spiller.spill(&frame(1)),
            Err(ShuffleError::Precondition(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let mut spiller = FrameSpiller::new(schema(), RunStorageBackend::Memory, 4).unwrap();
        let other = Frame::new(Schema::new(vec![ColumnType::Int64]), 1);
        assert!(spiller.spill(&other).is_err());
    }

    #[test]
    fn test_guard_releases_temp_dir() {
        let parent = tempfile::tempdir().unwrap();
        let backend = RunStorageBackend::TempDir {
            parent: Some(parent.path().to_path_buf()),
        };
        {
            let mut guard =
                SpillGuard::new(Box::new(FrameSpiller::new(schema(), backend, 4).unwrap()));
            guard.spill(&frame(5)).unwrap();
            assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 1);
        }
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_readers_survive_cleanup() {
        let ctx = CancellationToken::new();
        let mut spiller =
            FrameSpiller::new(schema(), RunStorageBackend::TempDir { parent: None }, 2).unwrap();
        spiller.spill(&frame(5)).unwrap();
        let mut readers = spiller.readers().unwrap();
        spiller.cleanup().unwrap();
        let rows = read_all(&ctx, readers[0].as_mut(), &schema(), 3).unwrap();
        assert_eq!(rows.len(), 5);
    }
}
