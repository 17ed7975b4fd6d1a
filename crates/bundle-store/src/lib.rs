//! Transformation Bundles
//!
//! A bundle holds everything fitted at training time (numeric scaler,
//! categorical encodings, canonical column order, model). It is loaded once,
//! validated, and then shared read-only by every prediction.

mod bundle;
mod format;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use bundle::{BundleMetadata, EvaluateError, Evaluation, Prediction, TransformationBundle};
pub use format::{from_bytes, load, save, to_bytes, BundleFormat, FORMAT_VERSION};

use std::path::PathBuf;

use feature_encoder::EncodeError;
use scorer::ScoreError;
use thiserror::Error;

/// Bundle could not be loaded or saved
#[derive(Debug, Error)]
pub enum BundleLoadError {
    #[error("Bundle file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt bundle: {0}")]
    Corrupt(String),
    #[error("Incompatible bundle format version {found} (supported: {supported})")]
    IncompatibleVersion { found: u32, supported: u32 },
    #[error("Inconsistent bundle: {0}")]
    Invalid(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure anywhere in encode → score → decide
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

impl PredictError {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Encode(e) => e.kind(),
            PredictError::Score(e) => e.kind(),
        }
    }

    /// Whether the caller can fix this by changing the request
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PredictError::Encode(
                EncodeError::MissingColumn(_)
                    | EncodeError::UnexpectedColumn(_)
                    | EncodeError::InvalidNumeric { .. }
                    | EncodeError::UnknownCategory { .. }
            ) | PredictError::Score(ScoreError::InvalidCutoff(_))
        )
    }
}
