//! Error types for readers, sorts and operator construction.

use spillway_common::{CommonError, Diagnose};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by the shuffle and sort machinery.
///
/// The type is `Clone` so that a reader which has failed can hand the same
/// error back on every later call.
#[derive(Error, Debug, Clone)]
pub enum ShuffleError {
    /// No more rows in this scope. Not a failure.
    #[error("end of stream")]
    Eof,

    #[error("operation cancelled")]
    Cancelled,

    #[error("spill storage failed: {0}")]
    Storage(Arc<CommonError>),

    #[error("upstream read failed: {0}")]
    Source(String),

    /// A caller broke a contract: wrong dependency count, a partition that
    /// does not exist, frames with mismatched columns.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Graph construction rejected an operator's input type.
    #[error("{op}: {message}")]
    Type { op: String, message: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for shuffle operations
pub type ShuffleResult<T> = Result<T, ShuffleError>;

impl ShuffleError {
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::Precondition(message.into())
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, ShuffleError::Eof)
    }

    /// Programming and construction errors. Callers should abort the
    /// operator invocation rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShuffleError::Precondition(_)
                | ShuffleError::Type { .. }
                | ShuffleError::Configuration(_)
        )
    }

    /// Whether the engine driving this operation may retry it. Nothing in
    /// this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ShuffleError::Storage(err) => err.is_retryable(),
            ShuffleError::Source(_) => true,
            _ => false,
        }
    }
}

impl From<CommonError> for ShuffleError {
    fn from(err: CommonError) -> Self {
        ShuffleError::Storage(Arc::new(err))
    }
}
