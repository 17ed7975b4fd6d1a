//! Fitted Model Families

use serde::{Deserialize, Serialize};

use crate::ScoreError;

/// Anything that maps a canonical feature row to a positive-class probability
pub trait ProbabilisticModel: Send + Sync {
    /// Width of the feature vector the model was fitted on
    fn n_features(&self) -> usize;

    /// Training column names in order, when the model recorded them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Probability of the positive class (index 1)
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoreError>;
}

/// One node of a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// `features[feature] <= threshold` goes left, otherwise right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Positive-class probability at this leaf
    Leaf { probability: f64 },
}

/// Decision tree stored as a node array rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!("node {i} splits on feature {feature} of {n_features}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {i} has a NaN threshold"));
                    }
                    // Children after the parent keeps traversal acyclic.
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} points at invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(&probability) {
                        return Err(format!("leaf {i} holds probability {probability}"));
                    }
                }
            }
        }
        Ok(())
    }

    /// `None` when the walk leaves the node array, reads past the feature row
    /// or revisits a node; only reachable for trees that skipped validation
    fn leaf_probability(&self, features: &[f64]) -> Option<f64> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match *self.nodes.get(idx)? {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if *features.get(feature)? <= threshold { left } else { right };
                }
                TreeNode::Leaf { probability } => return Some(probability),
            }
        }
        None
    }
}

/// Fitted estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    /// `sigmoid(intercept + coefficients · x)`
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// Mean of the per-tree leaf probabilities
    RandomForestClassifier {
        n_features: usize,
        trees: Vec<DecisionTree>,
    },
    /// `intercept + coefficients · x`; not probabilistic
    LinearRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression { .. } => "logistic_regression",
            Estimator::RandomForestClassifier { .. } => "random_forest_classifier",
            Estimator::LinearRegression { .. } => "linear_regression",
        }
    }
}

/// A fitted model, optionally carrying the column names it was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    feature_names: Option<Vec<String>>,
    estimator: Estimator,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn linear(coefficients: &[f64], intercept: f64, features: &[f64]) -> f64 {
    intercept
        + coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum::<f64>()
}

impl Model {
    pub fn new(estimator: Estimator) -> Self {
        Self {
            feature_names: None,
            estimator,
        }
    }

    pub fn logistic_regression(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self::new(Estimator::LogisticRegression {
            coefficients,
            intercept,
        })
    }

    pub fn random_forest(n_features: usize, trees: Vec<DecisionTree>) -> Self {
        Self::new(Estimator::RandomForestClassifier { n_features, trees })
    }

    pub fn linear_regression(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self::new(Estimator::LinearRegression {
            coefficients,
            intercept,
        })
    }

    /// Record the training column names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn kind(&self) -> &'static str {
        self.estimator.kind()
    }

    /// Whether `predict_proba` is meaningful for this model
    pub fn is_probabilistic(&self) -> bool {
        !matches!(self.estimator, Estimator::LinearRegression { .. })
    }

    /// Check the fitted parameters are internally consistent
    pub fn validate(&self) -> Result<(), String> {
        match &self.estimator {
            Estimator::LogisticRegression {
                coefficients,
                intercept,
            }
            | Estimator::LinearRegression {
                coefficients,
                intercept,
            } => {
                if coefficients.is_empty() {
                    return Err("model has no coefficients".to_string());
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("model parameters must be finite".to_string());
                }
            }
            Estimator::RandomForestClassifier { n_features, trees } => {
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(*n_features)
                        .map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }

        if let Some(names) = &self.feature_names {
            if names.len() != self.n_features() {
                return Err(format!(
                    "model records {} feature names for {} features",
                    names.len(),
                    self.n_features()
                ));
            }
        }
        Ok(())
    }

    fn check_width(&self, features: &[f64]) -> Result<(), ScoreError> {
        let expected = self.n_features();
        if features.len() != expected {
            return Err(ScoreError::ModelInvocation {
                expected,
                actual: features.len(),
                reason: "feature vector length does not match the model".to_string(),
            });
        }
        Ok(())
    }

    /// Raw regression output for regressors
    pub fn predict_value(&self, features: &[f64]) -> Result<f64, ScoreError> {
        self.check_width(features)?;
        match &self.estimator {
            Estimator::LinearRegression {
                coefficients,
                intercept,
            } => {
                let value = linear(coefficients, *intercept, features);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(ScoreError::ModelInvocation {
                        expected: coefficients.len(),
                        actual: features.len(),
                        reason: "regression output is not finite".to_string(),
                    })
                }
            }
            other => Err(ScoreError::ModelInvocation {
                expected: self.n_features(),
                actual: features.len(),
                reason: format!("{} is a classifier, not a regressor", other.kind()),
            }),
        }
    }
}

impl ProbabilisticModel for Model {
    fn n_features(&self) -> usize {
        match &self.estimator {
            Estimator::LogisticRegression { coefficients, .. }
            | Estimator::LinearRegression { coefficients, .. } => coefficients.len(),
            Estimator::RandomForestClassifier { n_features, .. } => *n_features,
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoreError> {
        self.check_width(features)?;
        match &self.estimator {
            Estimator::LogisticRegression {
                coefficients,
                intercept,
            } => Ok(sigmoid(linear(coefficients, *intercept, features))),
            Estimator::RandomForestClassifier { trees, .. } => {
                if trees.is_empty() {
                    return Err(ScoreError::ModelInvocation {
                        expected: self.n_features(),
                        actual: features.len(),
                        reason: "forest has no trees".to_string(),
                    });
                }
                let mut total = 0.0;
                for (t, tree) in trees.iter().enumerate() {
                    total += tree.leaf_probability(features).ok_or_else(|| {
                        ScoreError::ModelInvocation {
                            expected: self.n_features(),
                            actual: features.len(),
                            reason: format!("tree {t} is malformed"),
                        }
                    })?;
                }
                Ok(total / trees.len() as f64)
            }
            Estimator::LinearRegression { .. } => Err(ScoreError::ModelInvocation {
                expected: self.n_features(),
                actual: features.len(),
                reason: "linear_regression does not produce probabilities".to_string(),
            }),
        }
    }
}
