//! Transformation Bundle and Prediction Pipeline

use chrono::{DateTime, Utc};
use feature_encoder::{EncodeError, FeaturePipeline, FeatureVector, RawSample};
use scorer::{
    roc_auc, roc_curve, ClassificationReport, Cutoff, Decision, EvaluationError, Model,
    ProbabilisticModel, RocCurve, ScoreError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{BundleLoadError, PredictError};

/// Descriptive fields, for display only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Human-readable bundle name
    pub name: String,
    /// When the artifacts were exported
    pub created_at: Option<DateTime<Utc>>,
    /// What a positive decision means (e.g. "Approved")
    pub positive_label: Option<String>,
}

impl BundleMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
            positive_label: None,
        }
    }
}

/// Result of a full encode → score → decide run
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub decision: Decision,
    /// Vector the model was scored on
    pub features: FeatureVector,
}

/// Batch evaluation failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluateError {
    #[error("Row {row}: {source}")]
    Predict {
        row: usize,
        #[source]
        source: PredictError,
    },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Report over a labelled batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub report: ClassificationReport,
    /// `None` when only one class is present in the labels
    pub roc_auc: Option<f64>,
    /// `None` when only one class is present in the labels
    pub roc_curve: Option<RocCurve>,
    pub probabilities: Vec<f64>,
}

/// Immutable set of fitted artifacts shared by all predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationBundle {
    metadata: BundleMetadata,
    pipeline: FeaturePipeline,
    model: Model,
}

impl TransformationBundle {
    /// Assemble and validate a bundle
    pub fn new(
        metadata: BundleMetadata,
        pipeline: FeaturePipeline,
        model: Model,
    ) -> Result<Self, BundleLoadError> {
        let bundle = Self {
            metadata,
            pipeline,
            model,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Check every cross-artifact invariant
    pub fn validate(&self) -> Result<(), BundleLoadError> {
        self.pipeline
            .validate()
            .map_err(|e| BundleLoadError::Invalid(e.to_string()))?;
        self.model.validate().map_err(BundleLoadError::Invalid)?;

        let canonical = self.pipeline.canonical_order();
        if self.model.n_features() != canonical.len() {
            return Err(BundleLoadError::Invalid(format!(
                "model expects {} features, canonical order has {}",
                self.model.n_features(),
                canonical.len()
            )));
        }

        if let Some(names) = self.model.feature_names() {
            if names != canonical {
                return Err(BundleLoadError::Invalid(
                    "model feature names differ from the canonical column order".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Raw sample → canonical feature vector
    pub fn encode(&self, sample: &RawSample) -> Result<FeatureVector, EncodeError> {
        self.pipeline.encode(sample)
    }

    /// Positive-class probability of an encoded vector
    pub fn score(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        scorer::score(&self.model, features)
    }

    /// Encode, score and compare against the cutoff
    pub fn predict(&self, sample: &RawSample, cutoff: Cutoff) -> Result<Prediction, PredictError> {
        let features = self.encode(sample)?;
        let probability = self.score(&features)?;
        let decision = cutoff.decide(probability)?;

        debug!(
            "{}: p={:.4} accepted={}",
            self.metadata.name, decision.probability, decision.accepted
        );

        Ok(Prediction { decision, features })
    }

    /// Encode and run a regression model
    pub fn estimate(&self, sample: &RawSample) -> Result<f64, PredictError> {
        let features = self.encode(sample)?;
        let value = self.model.predict_value(features.values())?;
        debug!("{}: estimate={:.2}", self.metadata.name, value);
        Ok(value)
    }

    /// Predict every labelled row and summarise the outcome
    pub fn evaluate(
        &self,
        samples: &[RawSample],
        labels: &[bool],
        cutoff: Cutoff,
    ) -> Result<Evaluation, EvaluateError> {
        if samples.len() != labels.len() {
            return Err(EvaluationError::LengthMismatch {
                labels: labels.len(),
                predictions: samples.len(),
            }
            .into());
        }

        let probabilities = samples
            .iter()
            .enumerate()
            .map(|(row, sample)| {
                self.predict(sample, cutoff)
                    .map(|p| p.decision.probability)
                    .map_err(|source| EvaluateError::Predict { row, source })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let report = ClassificationReport::at_cutoff(labels, &probabilities, cutoff)?;
        let roc_auc = match roc_auc(labels, &probabilities) {
            Ok(auc) => Some(auc),
            Err(EvaluationError::SingleClass) => None,
            Err(e) => return Err(e.into()),
        };
        let roc_curve = match roc_curve(labels, &probabilities) {
            Ok(curve) => Some(curve),
            Err(EvaluationError::SingleClass) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Evaluation {
            report,
            roc_auc,
            roc_curve,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use proptest::prelude::*;

    #[test]
    fn test_loan_end_to_end() {
        let bundle = fixtures::loan_bundle();
        let sample = fixtures::loan_sample();

        let features = bundle.encode(&sample).unwrap();
        assert_eq!(features.columns(), bundle.pipeline().canonical_order());

        // Numeric block equals the fitted scaler transform of [150, 360, 8000]
        let expected = bundle
            .pipeline()
            .scaler()
            .transform(&[150.0, 360.0, 8000.0]);
        for (column, want) in ["LoanAmount", "Loan_Amount_Term", "TotalIncome"]
            .iter()
            .zip(expected)
        {
            assert_eq!(features.get(column), Some(want));
        }

        // Exactly one hot column per one-hot field
        for field in bundle.pipeline().categorical_columns() {
            let ones: f64 = field
                .output_columns()
                .iter()
                .map(|c| features.get(c).unwrap())
                .sum();
            assert_eq!(ones, 1.0, "field {}", field.name());
        }

        let p = bundle.score(&features).unwrap();
        assert!((0.0..=1.0).contains(&p));

        let prediction = bundle.predict(&sample, Cutoff::new(0.5).unwrap()).unwrap();
        assert_eq!(prediction.decision.probability, p);
        assert_eq!(prediction.decision.accepted, p >= 0.5);
        assert!(prediction.decision.accepted);
    }

    #[test]
    fn test_loan_rejection() {
        let bundle = fixtures::loan_bundle();
        let sample = fixtures::loan_sample()
            .with("Credit_History", 0.0)
            .with("Gender", "Female")
            .with("Married", "No")
            .with("Dependents", "1")
            .with("Education", "Not Graduate")
            .with("Self_Employed", "Yes")
            .with("Property_Area", "Rural");

        let prediction = bundle.predict(&sample, Cutoff::default()).unwrap();
        assert!(!prediction.decision.accepted);
        assert!(prediction.decision.margin() < 0.0);
    }

    #[test]
    fn test_cutoff_extremes() {
        let bundle = fixtures::loan_bundle();
        let sample = fixtures::loan_sample();
        assert!(bundle.predict(&sample, Cutoff::new(0.0).unwrap()).unwrap().decision.accepted);

        let p = bundle.predict(&sample, Cutoff::default()).unwrap().decision.probability;
        let at_p = bundle.predict(&sample, Cutoff::new(p).unwrap()).unwrap();
        assert!(at_p.decision.accepted);
    }

    #[test]
    fn test_unknown_category_without_fallback() {
        let bundle = fixtures::loan_bundle();
        let err = bundle
            .predict(&fixtures::loan_sample().with("Property_Area", "Downtown"), Cutoff::default())
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_category");
    }

    #[test]
    fn test_integer_category_matches_text() {
        let bundle = fixtures::loan_bundle();
        let as_integer = fixtures::loan_sample().with("Dependents", 0);
        let as_text = fixtures::loan_sample().with("Dependents", "0");

        assert_eq!(
            bundle.encode(&as_integer).unwrap(),
            bundle.encode(&as_text).unwrap()
        );
    }

    #[test]
    fn test_car_unseen_brand_uses_other() {
        let bundle = fixtures::car_price_bundle();
        let unseen = fixtures::car_sample().with("car", "BrandNeverSeenInTraining");
        let other = fixtures::car_sample().with("car", "Other");

        assert_eq!(bundle.encode(&unseen).unwrap(), bundle.encode(&other).unwrap());
        assert_eq!(
            bundle.estimate(&unseen).unwrap(),
            bundle.estimate(&other).unwrap()
        );
    }

    #[test]
    fn test_car_estimate() {
        let bundle = fixtures::car_price_bundle();
        let value = bundle.estimate(&fixtures::car_sample()).unwrap();
        assert!((value - 15_250.0).abs() < 1e-6);

        // Regressors are not probabilistic
        let err = bundle
            .predict(&fixtures::car_sample(), Cutoff::default())
            .unwrap_err();
        assert_eq!(err.kind(), "model_invocation");
    }

    #[test]
    fn test_classifier_cannot_estimate() {
        let bundle = fixtures::loan_bundle();
        let err = bundle.estimate(&fixtures::loan_sample()).unwrap_err();
        assert_eq!(err.kind(), "model_invocation");
    }

    #[test]
    fn test_forest_bundle() {
        let bundle = fixtures::bankruptcy_bundle();
        let healthy = bundle
            .predict(&fixtures::bankruptcy_sample(), Cutoff::default())
            .unwrap();
        assert!(!healthy.decision.accepted);

        let distressed = fixtures::bankruptcy_sample()
            .with("debt_ratio", 0.95)
            .with("roa", -0.3);
        let prediction = bundle.predict(&distressed, Cutoff::default()).unwrap();
        assert!(prediction.decision.accepted);
    }

    #[test]
    fn test_validate_rejects_width_mismatch() {
        let bundle = fixtures::loan_bundle();
        let err = TransformationBundle::new(
            bundle.metadata().clone(),
            bundle.pipeline().clone(),
            Model::logistic_regression(vec![0.1; 3], 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, BundleLoadError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_reordered_feature_names() {
        let bundle = fixtures::loan_bundle();
        let mut names = bundle.pipeline().canonical_order().to_vec();
        names.swap(0, 1);
        let model = Model::logistic_regression(vec![0.1; names.len()], 0.0).with_feature_names(names);

        let err =
            TransformationBundle::new(bundle.metadata().clone(), bundle.pipeline().clone(), model)
                .unwrap_err();
        assert!(matches!(err, BundleLoadError::Invalid(_)));
    }

    #[test]
    fn test_evaluate() {
        let bundle = fixtures::loan_bundle();
        let approved = fixtures::loan_sample();
        let rejected = fixtures::loan_sample()
            .with("Credit_History", 0.0)
            .with("Property_Area", "Rural");

        let evaluation = bundle
            .evaluate(
                &[approved.clone(), rejected.clone(), approved],
                &[true, false, false],
                Cutoff::default(),
            )
            .unwrap();

        assert_eq!(evaluation.probabilities.len(), 3);
        assert_eq!(evaluation.report.confusion.true_positives, 1);
        assert_eq!(evaluation.report.confusion.true_negatives, 1);
        assert_eq!(evaluation.report.confusion.false_positives, 1);
        assert!(evaluation.roc_auc.is_some());
        let curve = evaluation.roc_curve.as_ref().unwrap();
        assert_eq!(curve.fpr.len(), curve.thresholds.len());
        assert!((curve.area() - evaluation.roc_auc.unwrap()).abs() < 1e-12);

        let single = bundle
            .evaluate(&[rejected], &[false], Cutoff::default())
            .unwrap();
        assert_eq!(single.roc_auc, None);
        assert_eq!(single.roc_curve, None);
    }

    #[test]
    fn test_evaluate_reports_failing_row() {
        let bundle = fixtures::loan_bundle();
        let bad = fixtures::loan_sample().with("Gender", "Unknown");
        let err = bundle
            .evaluate(&[fixtures::loan_sample(), bad], &[true, false], Cutoff::default())
            .unwrap_err();
        assert!(matches!(err, EvaluateError::Predict { row: 1, .. }));

        let err = bundle
            .evaluate(&[fixtures::loan_sample()], &[], Cutoff::default())
            .unwrap_err();
        assert!(matches!(err, EvaluateError::Evaluation(_)));
    }

    proptest! {
        #[test]
        fn prop_predict_is_idempotent(
            amount in 9.0f64..700.0,
            term in 12.0f64..480.0,
            income in 150.0f64..120_000.0,
            cutoff in 0.0f64..=1.0,
        ) {
            let bundle = fixtures::loan_bundle();
            let sample = fixtures::loan_sample()
                .with("LoanAmount", amount)
                .with("Loan_Amount_Term", term)
                .with("TotalIncome", income);
            let cutoff = Cutoff::new(cutoff).unwrap();

            let first = bundle.predict(&sample, cutoff).unwrap();
            let second = bundle.predict(&sample, cutoff).unwrap();
            prop_assert_eq!(first.decision.probability.to_bits(), second.decision.probability.to_bits());
            prop_assert_eq!(first, second);
        }
    }
}
