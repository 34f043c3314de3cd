//! Error handling for the spillway-common crate.

use thiserror::Error;

/// Failure of run storage or of the encoding of a run.
///
/// Each variant keeps the underlying cause, when there is one, so the whole
/// chain shows up in diagnostics.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Misuse of a storage scope, e.g. writing after cleanup.
    #[error("Run storage operation failed: {message}")]
    StorageError { message: String },

    #[error("Serialization failed: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Deserialization failed: {message}")]
    DeserializationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The file system refused a read, write or removal.
    #[error("IO operation failed: {message}")]
    IoError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Resource not found: {message}")]
    NotFoundError { message: String },
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Lets the engine that owns retry policy ask whether a failure is transient.
pub trait Diagnose {
    fn is_retryable(&self) -> bool;
}

impl CommonError {
    pub fn storage_error<S: Into<String>>(message: S) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn serialization_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn deserialization_error<S: Into<String>>(message: S) -> Self {
        Self::DeserializationError {
            message: message.into(),
            source: None,
        }
    }

    pub fn deserialization_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::DeserializationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn io_error<S: Into<String>>(message: S) -> Self {
        Self::IoError {
            message: message.into(),
            source: None,
        }
    }

    pub fn io_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::IoError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_found_error<S: Into<String>>(message: S) -> Self {
        Self::NotFoundError {
            message: message.into(),
        }
    }
}

impl Diagnose for CommonError {
    fn is_retryable(&self) -> bool {
        // Only the file system can recover on its own; a corrupt run or a
        // missing id stays that way.
        matches!(self, CommonError::IoError { .. })
    }
}

/// Context helpers for adding rich context to errors.
pub mod context {
    use super::*;

    /// Extension trait for turning foreign I/O failures into [`CommonError`]s.
    pub trait ErrorContext<T> {
        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;
    }

    impl<T, E> ErrorContext<T> for std::result::Result<T, E>
    where
        E: Into<anyhow::Error>,
    {
        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::io_error_with_source(f(), e.into()))
        }
    }
}

pub use context::ErrorContext;
