//! Offline Evaluation of a Binary Classifier

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::Cutoff;

/// Errors while evaluating predictions against labels
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("{labels} labels but {predictions} predictions")]
    LengthMismatch { labels: usize, predictions: usize },
    #[error("No labelled rows to evaluate")]
    Empty,
    #[error("ROC AUC is undefined when only one class is present")]
    SingleClass,
    #[error("Score at row {0} is NaN")]
    InvalidScore(usize),
}

fn check_lengths(labels: usize, predictions: usize) -> Result<(), EvaluationError> {
    if labels != predictions {
        return Err(EvaluationError::LengthMismatch {
            labels,
            predictions,
        });
    }
    if labels == 0 {
        return Err(EvaluationError::Empty);
    }
    Ok(())
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// 2x2 confusion counts, positive class = `true`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Count hard predictions against labels
    pub fn from_predictions(actual: &[bool], predicted: &[bool]) -> Result<Self, EvaluationError> {
        check_lengths(actual.len(), predicted.len())?;

        let mut cm = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_positives += 1,
                (true, false) => cm.false_negatives += 1,
                (true, true) => cm.true_positives += 1,
            }
        }
        Ok(cm)
    }

    /// Threshold probabilities with the same `>=` rule as [`Cutoff::decide`]
    pub fn at_cutoff(
        actual: &[bool],
        probabilities: &[f64],
        cutoff: Cutoff,
    ) -> Result<Self, EvaluationError> {
        let predicted: Vec<bool> = probabilities.iter().map(|&p| p >= cutoff.value()).collect();
        Self::from_predictions(actual, &predicted)
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(
            (self.true_negatives + self.true_positives) as f64,
            self.total() as f64,
        )
    }

    /// Rows are actual `[negative, positive]`, columns predicted
    /// `[negative, positive]`; each column divided by its sum (an empty
    /// column stays zero).
    pub fn normalized_by_predicted(&self) -> [[f64; 2]; 2] {
        let pred_neg = (self.true_negatives + self.false_negatives) as f64;
        let pred_pos = (self.false_positives + self.true_positives) as f64;
        let col = |count: usize, sum: f64| count as f64 / if sum == 0.0 { 1.0 } else { sum };

        [
            [col(self.true_negatives, pred_neg), col(self.false_positives, pred_pos)],
            [col(self.false_negatives, pred_neg), col(self.true_positives, pred_pos)],
        ]
    }
}

/// Precision / recall / F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp as f64, (tp + fp) as f64);
        let recall = ratio(tp as f64, (tp + fn_) as f64);
        Self {
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            support: tp + fn_,
        }
    }
}

/// Per-class and averaged metrics of a binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_confusion(cm: ConfusionMatrix) -> Self {
        let positive = ClassMetrics::new(cm.true_positives, cm.false_positives, cm.false_negatives);
        // Negative class: roles of the off-diagonal cells swap.
        let negative = ClassMetrics::new(cm.true_negatives, cm.false_negatives, cm.false_positives);
        let total = cm.total();

        let average = |w_neg: f64, w_pos: f64| ClassMetrics {
            precision: w_neg * negative.precision + w_pos * positive.precision,
            recall: w_neg * negative.recall + w_pos * positive.recall,
            f1: w_neg * negative.f1 + w_pos * positive.f1,
            support: total,
        };

        let total_f = total as f64;
        Self {
            negative,
            positive,
            accuracy: cm.accuracy(),
            macro_avg: average(0.5, 0.5),
            weighted_avg: average(
                ratio(negative.support as f64, total_f),
                ratio(positive.support as f64, total_f),
            ),
            confusion: cm,
        }
    }

    pub fn at_cutoff(
        actual: &[bool],
        probabilities: &[f64],
        cutoff: Cutoff,
    ) -> Result<Self, EvaluationError> {
        ConfusionMatrix::at_cutoff(actual, probabilities, cutoff).map(Self::from_confusion)
    }
}

/// Area under the ROC curve via the rank statistic; ties share the average rank
pub fn roc_auc(actual: &[bool], scores: &[f64]) -> Result<f64, EvaluationError> {
    check_lengths(actual.len(), scores.len())?;
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(EvaluationError::InvalidScore(i));
    }

    let n_pos = actual.iter().filter(|&&a| a).count();
    let n_neg = actual.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EvaluationError::SingleClass);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| actual[i]).count();
        rank_sum_pos += avg_rank * positives as f64;
        start = end;
    }

    let n_pos_f = n_pos as f64;
    Ok((rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

/// ROC operating points, ordered from the strictest threshold down
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score cutoff of each point; the first is `+inf` (nothing predicted
    /// positive)
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Trapezoidal area under the curve
    pub fn area(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// ROC curve over every distinct score, highest first.
///
/// Tied scores collapse into one point, and interior points lying on a
/// straight segment between their neighbours are dropped.
pub fn roc_curve(actual: &[bool], scores: &[f64]) -> Result<RocCurve, EvaluationError> {
    check_lengths(actual.len(), scores.len())?;
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(EvaluationError::InvalidScore(i));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative counts at the last row of each run of equal scores
    let mut tps: Vec<usize> = Vec::new();
    let mut fps: Vec<usize> = Vec::new();
    let mut thresholds: Vec<f64> = Vec::new();
    let (mut tp, mut fp) = (0, 0);
    for (k, &i) in order.iter().enumerate() {
        if actual[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let run_ends = order
            .get(k + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if run_ends {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[i]);
        }
    }

    if tp == 0 || fp == 0 {
        return Err(EvaluationError::SingleClass);
    }

    let n = tps.len();
    let bends = |v: &[usize], i: usize| v[i - 1] + v[i + 1] != 2 * v[i];
    let keep: Vec<usize> = (0..n)
        .filter(|&i| i == 0 || i == n - 1 || bends(&tps, i) || bends(&fps, i))
        .collect();

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(fps[i] as f64 / fp as f64);
        curve.tpr.push(tps[i] as f64 / tp as f64);
        curve.thresholds.push(thresholds[i]);
    }
    Ok(curve)
}
