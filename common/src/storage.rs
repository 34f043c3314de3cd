//! Scoped storage for sorted runs.
//!
//! A run is an immutable blob written once and later read back sequentially.
//! Storage instances are scoped: everything they hold is reclaimed by
//! [`RunStorage::cleanup`], which is also invoked when the storage is dropped.
//! Run encoding is the caller's business; this layer only moves bytes.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{CommonError, ErrorContext, Result};

/// Identifier of a run within one storage scope, assigned in write order.
pub type RunId = usize;

/// Storage for the runs produced by one sort.
pub trait RunStorage: Send + Debug {
    /// Persist one run and return its identifier.
    fn put_run(&mut self, bytes: &[u8]) -> Result<RunId>;

    /// Open a sequential reader over a previously written run.
    fn open_run(&self, id: RunId) -> Result<Box<dyn Read + Send>>;

    /// Number of runs written so far.
    fn num_runs(&self) -> usize;

    /// Get storage statistics.
    fn stats(&self) -> RunStorageStats;

    /// Release every run. Calling this more than once is a no-op.
    ///
    /// Readers opened before cleanup keep working until dropped; no new
    /// readers can be opened afterwards.
    fn cleanup(&mut self) -> Result<()>;
}

/// Run storage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStorageStats {
    pub runs_written: u64,
    pub bytes_written: u64,
    pub runs_opened: u64,
}

/// Run storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStorageBackend {
    /// Keep runs in memory. Useful for tests and small inputs.
    Memory,
    /// One file per run inside a private temporary directory.
    TempDir {
        /// Directory in which the temporary directory is created; the system
        /// temporary directory when `None`.
        #[serde(default)]
        parent: Option<PathBuf>,
    },
}

impl Default for RunStorageBackend {
    fn default() -> Self {
        Self::TempDir { parent: None }
    }
}

/// Builder for creating run storage instances.
#[derive(Debug, Default)]
pub struct RunStorageBuilder {
    backend: RunStorageBackend,
}

impl RunStorageBuilder {
    /// Create a new builder using the default backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage backend.
    pub fn backend(mut self, backend: RunStorageBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Build a storage instance for the configured backend.
    pub fn build(self) -> Result<Box<dyn RunStorage>> {
        match self.backend {
            RunStorageBackend::Memory => Ok(Box::new(MemoryRunStorage::new())),
            RunStorageBackend::TempDir { parent } => {
                Ok(Box::new(TempDirRunStorage::new(parent)?))
            }
        }
    }
}

/// Internal statistics tracker shared by the backends.
#[derive(Debug, Default)]
struct InternalRunStats {
    runs_written: AtomicU64,
    bytes_written: AtomicU64,
    runs_opened: AtomicU64,
}

impl InternalRunStats {
    fn record_write(&self, bytes: usize) {
        self.runs_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_open(&self) {
        self.runs_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> RunStorageStats {
        RunStorageStats {
            runs_written: self.runs_written.load(Ordering::Acquire),
            bytes_written: self.bytes_written.load(Ordering::Acquire),
            runs_opened: self.runs_opened.load(Ordering::Acquire),
        }
    }
}

/// In-memory run storage.
#[derive(Debug, Default)]
pub struct MemoryRunStorage {
    runs: Vec<Arc<[u8]>>,
    released: bool,
    stats: InternalRunStats,
}

impl MemoryRunStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStorage for MemoryRunStorage {
    fn put_run(&mut self, bytes: &[u8]) -> Result<RunId> {
        if self.released {
            return Err(CommonError::storage_error(
                "cannot write a run after cleanup",
            ));
        }
        self.runs.push(Arc::from(bytes));
        self.stats.record_write(bytes.len());
        Ok(self.runs.len() - 1)
    }

    fn open_run(&self, id: RunId) -> Result<Box<dyn Read + Send>> {
        let run = self
            .runs
            .get(id)
            .ok_or_else(|| CommonError::not_found_error(format!("run {} does not exist", id)))?;
        self.stats.record_open();
        Ok(Box::new(Cursor::new(Arc::clone(run))))
    }

    fn num_runs(&self) -> usize {
        self.runs.len()
    }

    fn stats(&self) -> RunStorageStats {
        self.stats.get_stats()
    }

    fn cleanup(&mut self) -> Result<()> {
        if !self.released {
            debug!("Releasing {} in-memory runs", self.runs.len());
            self.runs.clear();
            self.released = true;
        }
        Ok(())
    }
}

/// File backed run storage. Each run is a file in a private temporary
/// directory that is removed on cleanup.
#[derive(Debug)]
pub struct TempDirRunStorage {
    dir: Option<TempDir>,
    runs: Vec<PathBuf>,
    stats: InternalRunStats,
}

impl TempDirRunStorage {
    /// Create the temporary directory, under `parent` if given.
    pub fn new(parent: Option<PathBuf>) -> Result<Self> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("spillway-");
            b
        };
        let dir = match &parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .with_io_context(|| format!("Failed to create spill directory in {:?}", parent))?;
        debug!("Created spill directory {:?}", dir.path());
        Ok(Self {
            dir: Some(dir),
            runs: Vec::new(),
            stats: InternalRunStats::default(),
        })
    }

    /// Path of the spill directory, or `None` once cleaned up.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().to_path_buf())
    }
}

impl RunStorage for TempDirRunStorage {
    fn put_run(&mut self, bytes: &[u8]) -> Result<RunId> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| CommonError::storage_error("cannot write a run after cleanup"))?;
        let id = self.runs.len();
        let path = dir.path().join(format!("run-{}.bin", id));
        let file = File::create(&path)
            .with_io_context(|| format!("Failed to create run file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .with_io_context(|| format!("Failed to write run file {:?}", path))?;
        self.runs.push(path);
        self.stats.record_write(bytes.len());
        Ok(id)
    }

    fn open_run(&self, id: RunId) -> Result<Box<dyn Read + Send>> {
        if self.dir.is_none() {
            return Err(CommonError::storage_error(
                "cannot open a run after cleanup",
            ));
        }
        let path = self
            .runs
            .get(id)
            .ok_or_else(|| CommonError::not_found_error(format!("run {} does not exist", id)))?;
        let file =
            File::open(path).with_io_context(|| format!("Failed to open run file {:?}", path))?;
        self.stats.record_open();
        Ok(Box::new(BufReader::new(file)))
    }

    fn num_runs(&self) -> usize {
        self.runs.len()
    }

    fn stats(&self) -> RunStorageStats {
        self.stats.get_stats()
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close()
                .with_io_context(|| format!("Failed to remove spill directory {:?}", path))?;
            debug!("Removed spill directory {:?} ({} runs)", path, self.runs.len());
        }
        Ok(())
    }
}

impl Drop for TempDirRunStorage {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Spill directory cleanup failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(storage: &dyn RunStorage, id: RunId) -> Vec<u8> {
        let mut buf = Vec::new();
        storage.open_run(id).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_memory_storage_basic_operations() {
        let mut storage = MemoryRunStorage::new();
        let a = storage.put_run(b"hello").unwrap();
        let b = storage.put_run(b"world!").unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(storage.num_runs(), 2);

        assert_eq!(read_back(&storage, a), b"hello");
        assert_eq!(read_back(&storage, b), b"world!");

        let stats = storage.stats();
        assert_eq!(stats.runs_written, 2);
        assert_eq!(stats.bytes_written, 11);
        assert_eq!(stats.runs_opened, 2);

        assert!(storage.open_run(7).is_err());
    }

    #[test]
    fn test_memory_storage_reader_outlives_cleanup() {
        let mut storage = MemoryRunStorage::new();
        let id = storage.put_run(b"abc").unwrap();
        let mut reader = storage.open_run(id).unwrap();
        storage.cleanup().unwrap();
        storage.cleanup().unwrap();

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"abc");
        assert!(storage.put_run(b"late").is_err());
    }

    #[test]
    fn test_temp_dir_storage() {
        let parent = tempfile::tempdir().unwrap();
        let mut storage = TempDirRunStorage::new(Some(parent.path().to_path_buf())).unwrap();
        let dir = storage.path().unwrap();
        assert!(dir.starts_with(parent.path()));

        let id = storage.put_run(b"spilled").unwrap();
        assert!(dir.join("run-0.bin").exists());
        assert_eq!(read_back(&storage, id), b"spilled");

        storage.cleanup().unwrap();
        assert!(!dir.exists());
        assert!(storage.path().is_none());
        assert!(storage.open_run(id).is_err());
        // Idempotent.
        storage.cleanup().unwrap();
    }

    #[test]
    fn test_temp_dir_storage_removed_on_drop() {
        let storage = TempDirRunStorage::new(None).unwrap();
        let dir = storage.path().unwrap();
        assert!(dir.exists());
        drop(storage);
        assert!(!dir.exists());
    }

    #[test]
    fn test_storage_builder_default() {
        let storage = RunStorageBuilder::new().build().unwrap();
        assert_eq!(storage.num_runs(), 0);

        let mut memory = RunStorageBuilder::new()
            .backend(RunStorageBackend::Memory)
            .build()
            .unwrap();
        memory.put_run(b"x").unwrap();
        assert_eq!(memory.stats().bytes_written, 1);
    }
}
