//! Validation Error Types

use thiserror::Error;

/// Reasons a row cannot become a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Identity column absent or blank
    #[error("Missing identity field '{0}'")]
    MissingIdentity(String),

    /// Value cannot be stored in its schema column
    #[error("Invalid value '{value}' for column '{column}'")]
    InvalidValue { column: String, value: String },

    /// Row width does not match the table header
    #[error("Row has {actual} cells, expected {expected}")]
    RowWidth { expected: usize, actual: usize },
}
