//! Cutoff Decisions

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ScoreError;

/// Probability threshold for a positive decision, always within `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cutoff(f64);

impl Cutoff {
    pub const DEFAULT: Cutoff = Cutoff(0.5);

    /// Validate a caller-supplied cutoff
    pub fn new(value: f64) -> Result<Self, ScoreError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoreError::InvalidCutoff(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Hard `>=` comparison of a probability against this cutoff
    pub fn decide(self, probability: f64) -> Result<Decision, ScoreError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ScoreError::InvalidProbability(probability));
        }

        let accepted = probability >= self.0;
        debug!(
            "Decision: p={:.4} cutoff={:.2} accepted={}",
            probability, self.0, accepted
        );

        Ok(Decision {
            probability,
            cutoff: self.0,
            accepted,
        })
    }
}

impl Default for Cutoff {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Cutoff {
    type Error = ScoreError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Cutoff::new(value)
    }
}

impl From<Cutoff> for f64 {
    fn from(cutoff: Cutoff) -> Self {
        cutoff.0
    }
}

/// Outcome of comparing a probability to a cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Positive-class probability
    pub probability: f64,
    /// Cutoff the decision was made against
    pub cutoff: f64,
    /// `probability >= cutoff`
    pub accepted: bool,
}

impl Decision {
    /// Distance above (positive) or below (negative) the cutoff
    pub fn margin(&self) -> f64 {
        self.probability - self.cutoff
    }
}

/// Compare a probability against a raw cutoff value
pub fn decide(probability: f64, cutoff: f64) -> Result<Decision, ScoreError> {
    Cutoff::new(cutoff)?.decide(probability)
}
