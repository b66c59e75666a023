//! Error types for field access on tuples

use thiserror::Error;

/// Result type alias for tuple operations
pub type Result<T> = std::result::Result<T, TupleError>;

/// Errors raised when reading a field out of a [`Tuple`](crate::Tuple)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TupleError {
    /// A required field is absent
    #[error("missing field: {field}")]
    MissingField { field: String },

    /// A field holds a different variant than the caller asked for
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl TupleError {
    pub fn missing(field: impl Into<String>) -> Self {
        TupleError::MissingField {
            field: field.into(),
        }
    }

    pub fn mismatch(field: impl Into<String>, expected: &'static str, actual: &'static str) -> Self {
        TupleError::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Name of the field that triggered the error
    pub fn field(&self) -> &str {
        match self {
            TupleError::MissingField { field } | TupleError::TypeMismatch { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = TupleError::missing("time");
        assert_eq!(err.to_string(), "missing field: time");
        assert_eq!(err.field(), "time");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = TupleError::mismatch("eid", "int", "float");
        assert_eq!(
            err.to_string(),
            "type mismatch on field 'eid': expected int, got float"
        );
    }
}
