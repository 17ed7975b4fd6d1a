//! Numeric Column Scaling

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// Fitted transform applied to the numeric block.
///
/// Parameters are the ones stored at fit time; nothing is re-estimated at
/// inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericScaler {
    /// Z-score: `(value - mean) / scale`, one entry per numeric column
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Values forwarded unscaled
    Passthrough,
}

impl NumericScaler {
    /// Check the parameters against the number of numeric columns
    pub fn validate(&self, n_columns: usize) -> Result<(), EncodeError> {
        match self {
            NumericScaler::Standard { mean, scale } => {
                if mean.len() != n_columns || scale.len() != n_columns {
                    return Err(EncodeError::InvalidLayout(format!(
                        "scaler fitted on {} means / {} scales, expected {} numeric columns",
                        mean.len(),
                        scale.len(),
                        n_columns
                    )));
                }
                if let Some(i) = mean.iter().position(|m| !m.is_finite()) {
                    return Err(EncodeError::InvalidLayout(format!(
                        "scaler mean at position {i} is not finite"
                    )));
                }
                if let Some(i) = scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
                    return Err(EncodeError::InvalidLayout(format!(
                        "scaler scale at position {i} must be finite and non-zero"
                    )));
                }
                Ok(())
            }
            NumericScaler::Passthrough => Ok(()),
        }
    }

    /// Transform one row of numeric values, in fitted column order
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        match self {
            NumericScaler::Standard { mean, scale } => values
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(v, (m, s))| (v - m) / s)
                .collect(),
            NumericScaler::Passthrough => values.to_vec(),
        }
    }
}
