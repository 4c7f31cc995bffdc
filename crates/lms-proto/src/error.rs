//! Protocol error types.

use thiserror::Error;

/// Errors raised while reading typed values out of rows.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was absent from the row.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field held a value of the wrong type.
    #[error("field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A string field held a value outside its enumeration.
    #[error("field '{field}' has unknown variant '{value}'")]
    UnknownVariant { field: String, value: String },
}
