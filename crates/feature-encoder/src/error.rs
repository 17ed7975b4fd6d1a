//! Encoding Error Types

use thiserror::Error;

/// Errors while turning a raw sample into a feature vector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// A raw column the pipeline was fitted on is absent from the sample
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The sample carries a column the pipeline does not know
    #[error("Unexpected column: {0}")]
    UnexpectedColumn(String),

    /// A numeric column value could not be read as a finite float
    #[error("Column {column} expects a finite number, got {value:?}")]
    InvalidNumeric { column: String, value: String },

    /// Value outside the fitted vocabulary on a column without fallback
    #[error("Unknown category {value:?} for column {column} (no fallback defined)")]
    UnknownCategory { column: String, value: String },

    /// Canonical columns could not be produced from the encoded blocks
    #[error("Schema mismatch: canonical columns missing after encoding: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Fitted layout is internally inconsistent
    #[error("Invalid feature layout: {0}")]
    InvalidLayout(String),
}

impl EncodeError {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::MissingColumn(_) => "missing_column",
            EncodeError::UnexpectedColumn(_) => "unexpected_column",
            EncodeError::InvalidNumeric { .. } => "invalid_numeric",
            EncodeError::UnknownCategory { .. } => "unknown_category",
            EncodeError::SchemaMismatch { .. } => "schema_mismatch",
            EncodeError::InvalidLayout(_) => "invalid_layout",
        }
    }
}
