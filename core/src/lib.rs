//! Spillway Core - shuffle and external sort machinery
//!
//! This crate provides the pieces a distributed stage uses to move and order
//! rows: columnar frames and sequential readers over them, an external sort
//! that spills sorted runs and merges them back, a partitioned in-memory task
//! buffer, and the reshuffle operator.

pub mod config;
pub mod error;
pub mod frame;
pub mod reader;
pub mod shuffle;
pub mod slice;
pub mod sort;
pub mod sorter;
pub mod spill;
pub mod task_buffer;
pub mod types;

pub use config::SortConfig;
pub use error::{ShuffleError, ShuffleResult};
pub use frame::{Column, Frame};
pub use reader::{EmptyReader, ErrReader, FrameReader, MultiReader, Reader, read_all, read_full};
pub use shuffle::{HashPartitioner, Partitioner};
pub use slice::{ConstSlice, Dependency, Name, Reshuffle, Slice, reshuffle};
pub use sort::{MergeReader, sort_reader, sort_reader_with_spiller};
pub use sorter::{FnSorter, KeySorter, SortKey, Sorter};
pub use spill::{FrameSpiller, SpillGuard, Spiller};
pub use task_buffer::{Scope, TaskBuffer, TaskBufferReader};
pub use types::{ColumnType, Schema, Value, check_combinable};

pub use tokio_util::sync::CancellationToken;
