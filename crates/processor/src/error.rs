//! Error types for the stream processor
//!
//! Data errors (`MissingField`, `TypeMismatch`) abort the record being
//! processed and are returned to whoever called `accept`/`flush`. They are
//! never retried or swallowed.

use flowwatch_types::TupleError;
use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A required field, e.g. a time or epoch key, is absent
    #[error("missing field: {field}")]
    MissingField { field: String },

    /// A field was read assuming the wrong value variant
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Execution errors
    #[error("execution error: {source}")]
    Execution {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    /// True for the two per-record data errors
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            ProcessorError::MissingField { .. } | ProcessorError::TypeMismatch { .. }
        )
    }
}

impl From<TupleError> for ProcessorError {
    fn from(err: TupleError) -> Self {
        match err {
            TupleError::MissingField { field } => ProcessorError::MissingField { field },
            TupleError::TypeMismatch {
                field,
                expected,
                actual,
            } => ProcessorError::TypeMismatch {
                field,
                expected,
                actual,
            },
        }
    }
}

/// Result type for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;
