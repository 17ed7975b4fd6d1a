//! Model Scoring
//!
//! Scores canonical feature vectors with a fitted model and turns the
//! positive-class probability into an accept/reject decision.

mod decision;
mod evaluation;
mod model;

pub use decision::{decide, Cutoff, Decision};
pub use evaluation::{
    roc_auc, roc_curve, ClassMetrics, ClassificationReport, ConfusionMatrix, EvaluationError,
    RocCurve,
};
pub use model::{DecisionTree, Estimator, Model, ProbabilisticModel, TreeNode};

use feature_encoder::FeatureVector;
use thiserror::Error;
use tracing::debug;

/// Errors during scoring and decision
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Model invocation failed: {reason} (expected {expected} features, got {actual})")]
    ModelInvocation {
        expected: usize,
        actual: usize,
        reason: String,
    },
    #[error("Cutoff {0} is outside [0, 1]")]
    InvalidCutoff(f64),
    #[error("Probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

impl ScoreError {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ScoreError::ModelInvocation { .. } => "model_invocation",
            ScoreError::InvalidCutoff(_) => "invalid_cutoff",
            ScoreError::InvalidProbability(_) => "invalid_probability",
        }
    }
}

/// Positive-class probability for an encoded vector.
///
/// Checks the vector against the model's expected width and, when the model
/// knows its training column names, against their order.
pub fn score<M>(model: &M, features: &FeatureVector) -> Result<f64, ScoreError>
where
    M: ProbabilisticModel + ?Sized,
{
    let expected = model.n_features();
    let actual = features.len();

    if expected != actual {
        return Err(ScoreError::ModelInvocation {
            expected,
            actual,
            reason: "feature vector length does not match the model".to_string(),
        });
    }

    if let Some(names) = model.feature_names() {
        if let Some((i, (want, got))) = names
            .iter()
            .zip(features.columns())
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(ScoreError::ModelInvocation {
                expected,
                actual,
                reason: format!("column {i} is {got:?}, model was fitted with {want:?}"),
            });
        }
    }

    let probability = model.predict_proba(features.values())?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ScoreError::ModelInvocation {
            expected,
            actual,
            reason: format!("model returned {probability}, not a probability"),
        });
    }

    debug!("Scored {} features: p={:.4}", actual, probability);
    Ok(probability)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl ProbabilisticModel for Broken {
        fn n_features(&self) -> usize {
            2
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ScoreError> {
            Ok(1.5)
        }
    }

    fn vector(columns: &[&str], values: &[f64]) -> FeatureVector {
        FeatureVector::new(
            columns.iter().map(|c| c.to_string()).collect(),
            values.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_score_logistic() {
        let model = Model::logistic_regression(vec![1.0, -1.0], 0.0);
        let p = score(&model, &vector(&["a", "b"], &[2.0, 2.0])).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let model = Model::logistic_regression(vec![1.0, -1.0, 0.5], 0.0);
        let err = score(&model, &vector(&["a", "b"], &[2.0, 2.0])).unwrap_err();
        assert_eq!(
            err,
            ScoreError::ModelInvocation {
                expected: 3,
                actual: 2,
                reason: "feature vector length does not match the model".into()
            }
        );
        assert!(err.to_string().contains("expected 3 features, got 2"));
    }

    #[test]
    fn test_order_mismatch() {
        let model = Model::logistic_regression(vec![1.0, -1.0], 0.0)
            .with_feature_names(vec!["a".into(), "b".into()]);
        let err = score(&model, &vector(&["b", "a"], &[2.0, 2.0])).unwrap_err();
        assert_eq!(err.kind(), "model_invocation");
        assert!(err.to_string().contains("column 0"));
    }

    #[test]
    fn test_out_of_range_output_is_wrapped() {
        let err = score(&Broken, &vector(&["a", "b"], &[0.0, 0.0])).unwrap_err();
        assert_eq!(err.kind(), "model_invocation");
    }

    #[test]
    fn test_regressor_is_not_probabilistic() {
        let model = Model::linear_regression(vec![1.0], 0.0);
        let err = score(&model, &vector(&["a"], &[1.0])).unwrap_err();
        assert_eq!(err.kind(), "model_invocation");
    }
}
