//! Sort configuration.

use crate::error::{ShuffleError, ShuffleResult};
use serde::{Deserialize, Serialize};
use spillway_common::RunStorageBackend;

/// Rows in the first batch of a sort, before any row size is known.
pub const CANARY_ROWS: usize = 1 << 14;

/// Smallest batch a sort recalibrates down to. Also the number of rows a
/// run is encoded and merged in.
pub const SPILL_BATCH_SIZE: usize = 128;

/// Default number of bytes each spilled run should occupy.
pub const DEFAULT_SPILL_TARGET_BYTES: usize = 32 << 20;

/// Configuration for an external sort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Target encoded size of one run in bytes
    pub spill_target_bytes: usize,
    /// Rows in the first batch
    pub canary_rows: usize,
    /// Floor for recalibrated batch sizes
    pub min_batch_rows: usize,
    /// Relative deviation from the target batch size tolerated before the
    /// working batch is resized
    pub tolerance: f64,
    /// Where runs are kept
    pub storage: RunStorageBackend,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            spill_target_bytes: DEFAULT_SPILL_TARGET_BYTES,
            canary_rows: CANARY_ROWS,
            min_batch_rows: SPILL_BATCH_SIZE,
            tolerance: 0.05,
            storage: RunStorageBackend::default(),
        }
    }
}

impl SortConfig {
    pub fn builder() -> SortConfigBuilder {
        SortConfigBuilder::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ShuffleResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ShuffleError::Configuration(format!("invalid sort config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShuffleResult<()> {
        if self.spill_target_bytes == 0 {
            return Err(ShuffleError::Configuration(
                "spill_target_bytes must be positive".to_string(),
            ));
        }
        if self.canary_rows == 0 {
            return Err(ShuffleError::Configuration(
                "canary_rows must be positive".to_string(),
            ));
        }
        if self.min_batch_rows == 0 {
            return Err(ShuffleError::Configuration(
                "min_batch_rows must be positive".to_string(),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ShuffleError::Configuration(format!(
                "tolerance must be in (0, 1), got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Builder for [`SortConfig`].
#[derive(Debug, Default)]
pub struct SortConfigBuilder {
    config: SortConfig,
}

impl SortConfigBuilder {
    pub fn spill_target_bytes(mut self, bytes: usize) -> Self {
        self.config.spill_target_bytes = bytes;
        self
    }

    pub fn canary_rows(mut self, rows: usize) -> Self {
        self.config.canary_rows = rows;
        self
    }

    pub fn min_batch_rows(mut self, rows: usize) -> Self {
        self.config.min_batch_rows = rows;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn storage(mut self, storage: RunStorageBackend) -> Self {
        self.config.storage = storage;
        self
    }

    /// Keep runs in memory.
    pub fn in_memory(self) -> Self {
        self.storage(RunStorageBackend::Memory)
    }

    pub fn build(self) -> ShuffleResult<SortConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
