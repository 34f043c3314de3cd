//! Core components for shuffle operations.

pub mod partitioner;

pub use partitioner::*;
