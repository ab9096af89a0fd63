//! Held-out evaluation metrics

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics for model evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy (classification)
    pub accuracy: Option<f64>,
    /// Support-weighted precision (classification)
    pub precision: Option<f64>,
    /// Support-weighted recall (classification)
    pub recall: Option<f64>,
    /// Support-weighted F1 score (classification)
    pub f1_score: Option<f64>,
    /// AUC-ROC (binary classification only)
    pub auc_roc: Option<f64>,
    /// Mean Squared Error (regression)
    pub mse: Option<f64>,
    /// Root Mean Squared Error (regression)
    pub rmse: Option<f64>,
    /// Mean Absolute Error (regression)
    pub mae: Option<f64>,
    /// R-squared (regression)
    pub r2: Option<f64>,
    /// Mean cross-validation score
    pub cv_mean: Option<f64>,
    /// Standard deviation of cross-validation scores
    pub cv_std: Option<f64>,
    /// Training time in seconds
    pub training_time_secs: f64,
    /// Number of features
    pub n_features: usize,
    /// Number of evaluation samples
    pub n_samples: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accuracy plus weighted precision, recall and F1.
    ///
    /// `positive_scores` holds the positive-class probability per row; it
    /// is only used for AUC and only when the problem is binary.
    pub fn compute_classification(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        positive_scores: Option<&Array1<f64>>,
    ) -> Self {
        let mut metrics = Self::new();
        let n = y_true.len();
        metrics.n_samples = n;
        if n == 0 {
            return metrics;
        }

        let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
        metrics.accuracy = Some(correct as f64 / n as f64);

        let mut labels: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
        labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        labels.dedup();

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for label in &labels {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (t, p) in y_true.iter().zip(y_pred.iter()) {
                match (t == label, p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let support = (tp + fn_) as f64 / n as f64;
            let p = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
            let r = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            precision += support * p;
            recall += support * r;
            f1 += support * f;
        }

        metrics.precision = Some(precision);
        metrics.recall = Some(recall);
        metrics.f1_score = Some(f1);

        let true_classes: Vec<f64> = {
            let mut c: Vec<f64> = y_true.to_vec();
            c.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            c.dedup();
            c
        };
        if let (Some(scores), 2) = (positive_scores, true_classes.len()) {
            let positive = true_classes[1];
            let is_positive: Vec<bool> = y_true.iter().map(|t| *t == positive).collect();
            metrics.auc_roc = roc_auc(&is_positive, scores);
        }

        metrics
    }

    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut metrics = Self::new();
        metrics.n_samples = y_true.len();
        if y_true.is_empty() {
            return metrics;
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        metrics.mse = Some(mse);
        metrics.rmse = Some(mse.sqrt());
        metrics.mae = Some(errors.iter().map(|e| e.abs()).sum::<f64>() / n);

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        metrics.r2 = Some(if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 });

        metrics
    }

    /// Flatten the populated metrics into a name -> value map
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let entries = [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
            ("auc_roc", self.auc_roc),
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("mae", self.mae),
            ("r2", self.r2),
            ("cv_mean", self.cv_mean),
            ("cv_std", self.cv_std),
        ];

        let mut map: BTreeMap<String, f64> = entries
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect();
        map.insert("training_time_secs".to_string(), self.training_time_secs);
        map
    }

    /// Headline score used for cross-validation: accuracy or R²
    pub fn primary_score(&self) -> Option<f64> {
        self.accuracy.or(self.r2)
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
///
/// `None` when only one class is present.
pub fn roc_auc(is_positive: &[bool], scores: &Array1<f64>) -> Option<f64> {
    let n_pos = is_positive.iter().filter(|p| **p).count();
    let n_neg = is_positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block shares the average rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if is_positive[idx] {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Probability column for `class_idx`, or `None` if it is out of range
pub fn class_column(proba: &Array2<f64>, class_idx: usize) -> Option<Array1<f64>> {
    (class_idx < proba.ncols()).then(|| proba.column(class_idx).to_owned())
}
