//! Common utilities and abstractions for the spillway project.
//!
//! This crate provides the error taxonomy shared across the workspace and the
//! scoped run storage that sorted runs are spilled into.

pub mod error;
pub mod storage;

pub use error::{CommonError, Diagnose, ErrorContext, Result};
pub use storage::{
    MemoryRunStorage, RunId, RunStorage, RunStorageBackend, RunStorageBuilder, RunStorageStats,
    TempDirRunStorage,
};
