//! Model explainability module
//!
//! Two post-hoc attribution backends over the model variants:
//! - [`ContributionExplainer`]: additive, baseline-relative attributions
//!   (exact TreeSHAP for tree families, closed form for affine models,
//!   permutation sampling for everything else)
//! - [`PerturbationExplainer`]: local surrogate fitted on perturbed
//!   neighbours of one instance
//!
//! Both work on encoded, unscaled rows as produced by
//! [`PredictiveModel::encode`] and never raise: failures come back as
//! [`ExplainError`] values.

mod contribution;
mod perturbation;
mod tree_shap;

pub use contribution::{
    ContributionExplainer, ContributionExplanation, ContributionStrategy, ExplainerInfo,
    SummaryPlotData,
};
pub use perturbation::{
    PerturbationExplainer, PerturbationExplanation, PerturbationInfo, PerturbationMode,
};
pub use tree_shap::{tree_expected_value, tree_shap};

use crate::error::Result;
use crate::models::{Model, PredictiveModel, TaskType};
use crate::training::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Explanation outcome that is not an attribution
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExplainError {
    #[error("{0} not available")]
    Unavailable(String),

    #[error("No explainer found for {0}")]
    NoExplainer(String),

    #[error("Explanation failed: {0}")]
    Failed(String),

    #[error("Explanation cancelled")]
    Cancelled,
}

pub type ExplainResult<T> = std::result::Result<T, ExplainError>;

impl From<ExplainError> for crate::error::DecisionError {
    fn from(err: ExplainError) -> Self {
        use crate::error::DecisionError;
        match err {
            ExplainError::Unavailable(what) => DecisionError::ExplainerUnavailable(what),
            ExplainError::NoExplainer(name) => {
                DecisionError::ExplainerUnavailable(format!("no explainer for {}", name))
            }
            ExplainError::Failed(msg) => DecisionError::ComputationError(msg),
            ExplainError::Cancelled => DecisionError::ExplanationTimedOut(0),
        }
    }
}

/// Deadline plus cancellation flag polled by the sampling loops
#[derive(Debug, Clone, Default)]
pub struct ExplainBudget {
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl ExplainBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask every loop holding a clone of this budget to stop
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> ExplainResult<()> {
        if self.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d) {
            Err(ExplainError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How a model's output can be decomposed, decided by its variant
pub enum ModelStructure<'a> {
    /// Tree families; forest output is the mean of these trees
    TreeEnsemble(Vec<&'a DecisionTree>),
    /// Output is `coef · x_scaled + intercept`
    Linear { coef: Array1<f64>, intercept: f64 },
    /// Only the prediction function is usable
    Opaque,
}

pub fn model_structure(model: &Model) -> ModelStructure<'_> {
    match model {
        Model::DecisionTree(_) | Model::RandomForest(_) => ModelStructure::TreeEnsemble(model.trees()),
        Model::NeuralNetwork(nn) => match nn.linear_coefficients() {
            Some((coef, intercept)) => ModelStructure::Linear { coef, intercept },
            None => ModelStructure::Opaque,
        },
        Model::Qda(_) => ModelStructure::Opaque,
    }
}

/// What a prediction function returns for classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbabilitySource {
    /// The model's own class probabilities
    Native,
    /// One-hot rows built from hard labels
    HardLabels,
}

/// Shared prediction function over encoded, unscaled rows
pub type PredictFn = Arc<dyn Fn(&Array2<f64>) -> Result<Array2<f64>> + Send + Sync>;

/// Adapter from a model to a row-matrix prediction function: class
/// probabilities for classifiers, a single value column for regressors.
pub fn prediction_fn(model: Arc<Model>) -> PredictFn {
    prediction_fn_with(model, ProbabilitySource::Native)
}

pub fn prediction_fn_with(model: Arc<Model>, source: ProbabilitySource) -> PredictFn {
    Arc::new(move |x: &Array2<f64>| {
        let output = model.score_rows(x)?;
        match (model.task(), source) {
            (TaskType::Regression, _) => Ok(output.column(0).to_owned().insert_axis(Axis(1))),
            (TaskType::Classification, ProbabilitySource::Native) => Ok(output),
            (TaskType::Classification, ProbabilitySource::HardLabels) => Ok(one_hot(&output)),
        }
    })
}

/// Replace each probability row by the indicator of its top class, keeping
/// at least two columns
fn one_hot(proba: &Array2<f64>) -> Array2<f64> {
    let width = proba.ncols().max(2);
    let mut out = Array2::zeros((proba.nrows(), width));
    for (i, row) in proba.rows().into_iter().enumerate() {
        let values = row.to_vec();
        let best = crate::training::decision_tree::argmax(&values).unwrap_or(0);
        out[[i, best]] = 1.0;
    }
    out
}

/// Indices ordered by descending magnitude; ties keep feature order
pub fn rank_by_magnitude(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .abs()
            .partial_cmp(&values[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Name of feature `idx`, `feature_{idx}` when none was supplied
pub(crate) fn feature_label(names: Option<&[String]>, idx: usize) -> String {
    names
        .and_then(|n| n.get(idx).cloned())
        .unwrap_or_else(|| format!("feature_{}", idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_budget_cancel_and_deadline() {
        let budget = ExplainBudget::unbounded();
        assert!(budget.check().is_ok());
        let clone = budget.clone();
        budget.cancel();
        assert_eq!(clone.check(), Err(ExplainError::Cancelled));

        let expired = ExplainBudget::with_timeout(Duration::from_millis(0));
        assert_eq!(expired.check(), Err(ExplainError::Cancelled));
    }

    #[test]
    fn test_rank_by_magnitude() {
        assert_eq!(rank_by_magnitude(&[0.1, -3.0, 2.0, 0.0]), vec![1, 2, 0, 3]);
        assert!(rank_by_magnitude(&[]).is_empty());
    }

    #[test]
    fn test_one_hot_has_two_columns_minimum() {
        let proba = array![[0.2, 0.8], [0.9, 0.1]];
        assert_eq!(one_hot(&proba), array![[0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(one_hot(&array![[1.0]]).ncols(), 2);
    }

    #[test]
    fn test_untrained_model_structure_and_adapter() {
        let model = Arc::new(Model::new(crate::models::ModelKind::RandomForest));
        assert!(matches!(model_structure(&model), ModelStructure::TreeEnsemble(t) if t.is_empty()));
        let predict = prediction_fn(model);
        assert!(predict(&Array2::zeros((1, 3))).is_err());
    }
}
