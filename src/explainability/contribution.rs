//! Attribution by contribution (Shapley-style, additive)

use super::tree_shap::{tree_expected_value, tree_shap};
use super::{
    feature_label, model_structure, rank_by_magnitude, ExplainBudget, ExplainError, ExplainResult,
    ModelStructure,
};
use crate::models::{Model, PredictiveModel, BACKGROUND_ROWS};
use ndarray::{s, Array1, Array2, Axis};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decomposition technique chosen for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStrategy {
    /// Exact TreeSHAP averaged over the trees
    Tree,
    /// `w_i * (x_i - E[x_i])` on scaled features
    Linear,
    /// Permutation sampling against a background sample
    Sampling,
}

impl fmt::Display for ContributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContributionStrategy::Tree => "tree",
            ContributionStrategy::Linear => "linear",
            ContributionStrategy::Sampling => "sampling",
        };
        f.write_str(name)
    }
}

/// One additive explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionExplanation {
    pub strategy: ContributionStrategy,
    /// Signed contribution per feature, in feature order
    pub values: Vec<f64>,
    /// Baseline the contributions are measured from
    pub expected_value: f64,
    /// `|values|`
    pub feature_importance: Vec<f64>,
    /// Feature indices by descending `|value|`
    pub importance_ranking: Vec<usize>,
    pub feature_names: Option<Vec<String>>,
    pub feature_contributions: Option<BTreeMap<String, f64>>,
    pub ranked_features: Option<Vec<String>>,
}

impl ContributionExplanation {
    fn new(
        strategy: ContributionStrategy,
        values: Vec<f64>,
        expected_value: f64,
        names: Option<&[String]>,
    ) -> Self {
        let feature_importance: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        let importance_ranking = rank_by_magnitude(&values);
        let names = names.filter(|n| n.len() == values.len());

        Self {
            strategy,
            feature_contributions: names
                .map(|n| n.iter().cloned().zip(values.iter().copied()).collect()),
            ranked_features: names.map(|n| importance_ranking.iter().map(|&i| n[i].clone()).collect()),
            feature_names: names.map(|n| n.to_vec()),
            values,
            expected_value,
            feature_importance,
            importance_ranking,
        }
    }

    /// Output the contributions add up to
    pub fn model_output(&self) -> f64 {
        self.expected_value + self.values.iter().sum::<f64>()
    }
}

/// Input for a summary plot of the strongest features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPlotData {
    /// Contributions restricted to the displayed features, one row per instance
    pub values: Vec<Vec<f64>>,
    pub feature_values: Vec<Vec<f64>>,
    /// Mean `|contribution|` of each displayed feature
    pub feature_importance: Vec<f64>,
    pub feature_indices: Vec<usize>,
    pub feature_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerInfo {
    pub explainer_type: ContributionStrategy,
    pub model_name: String,
    pub expected_value: f64,
    pub available: bool,
}

enum Backend {
    Tree,
    Linear { coef: Array1<f64>, mean: Array1<f64> },
    Sampling { background: Array2<f64> },
}

struct ExplainerState {
    model: Arc<Model>,
    backend: Backend,
    /// Output column being explained
    output: usize,
    expected_value: f64,
}

impl ExplainerState {
    fn strategy(&self) -> ContributionStrategy {
        match self.backend {
            Backend::Tree => ContributionStrategy::Tree,
            Backend::Linear { .. } => ContributionStrategy::Linear,
            Backend::Sampling { .. } => ContributionStrategy::Sampling,
        }
    }
}

/// Registry of contribution explainers keyed by model name
pub struct ContributionExplainer {
    available: bool,
    permutations: usize,
    seed: u64,
    explainers: RwLock<HashMap<String, Arc<ExplainerState>>>,
}

impl Default for ContributionExplainer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ContributionExplainer {
    /// `available` is the backend capability resolved at start-up
    pub fn new(available: bool) -> Self {
        if !available {
            warn!("Contribution explainer disabled");
        }
        Self {
            available,
            permutations: 4,
            seed: 42,
            explainers: RwLock::new(HashMap::new()),
        }
    }

    /// Permutations drawn per background row by the sampling strategy
    pub fn with_permutations(mut self, n: usize) -> Self {
        self.permutations = n.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn has_explainer(&self, name: &str) -> bool {
        self.explainers.read().contains_key(name)
    }

    /// Build an explainer for `model` under `name`.
    ///
    /// `background` holds encoded, unscaled rows; the model's own training
    /// sample is used when `None`. Returns false when the backend is
    /// disabled or the model cannot be explained.
    pub fn create(&self, name: &str, model: Arc<Model>, background: Option<&Array2<f64>>) -> bool {
        if !self.available {
            warn!(model = %name, "Contribution explainer not available");
            return false;
        }
        match build_state(model, background) {
            Ok(state) => {
                info!(
                    model = %name,
                    strategy = %state.strategy(),
                    expected_value = state.expected_value,
                    "Created contribution explainer"
                );
                self.explainers.write().insert(name.to_string(), Arc::new(state));
                true
            }
            Err(e) => {
                warn!(model = %name, error = %e, "Failed to create contribution explainer");
                false
            }
        }
    }

    pub fn remove_explainer(&self, name: &str) -> bool {
        let removed = self.explainers.write().remove(name).is_some();
        if removed {
            info!(model = %name, "Removed contribution explainer");
        }
        removed
    }

    pub fn explainer_info(&self, name: &str) -> Option<ExplainerInfo> {
        self.explainers.read().get(name).map(|state| ExplainerInfo {
            explainer_type: state.strategy(),
            model_name: name.to_string(),
            expected_value: state.expected_value,
            available: self.available,
        })
    }

    fn state(&self, name: &str) -> ExplainResult<Arc<ExplainerState>> {
        if !self.available {
            return Err(ExplainError::Unavailable("contribution explainer".to_string()));
        }
        self.explainers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ExplainError::NoExplainer(name.to_string()))
    }

    /// Explain one encoded, unscaled instance
    pub fn explain(
        &self,
        name: &str,
        instance: &Array1<f64>,
        feature_names: Option<&[String]>,
    ) -> ExplainResult<ContributionExplanation> {
        self.explain_with_budget(name, instance, feature_names, &ExplainBudget::unbounded())
    }

    pub fn explain_with_budget(
        &self,
        name: &str,
        instance: &Array1<f64>,
        feature_names: Option<&[String]>,
        budget: &ExplainBudget,
    ) -> ExplainResult<ContributionExplanation> {
        let state = self.state(name)?;
        let values = self.contributions(&state, instance, budget).map_err(|e| {
            warn!(model = %name, error = %e, "Contribution explanation failed");
            e
        })?;
        debug!(model = %name, n_features = values.len(), "Contribution explanation computed");
        Ok(ContributionExplanation::new(
            state.strategy(),
            values,
            state.expected_value,
            feature_names,
        ))
    }

    /// Mean `|contribution|` per feature over the rows of `instances`
    pub fn get_feature_importance(
        &self,
        name: &str,
        instances: &Array2<f64>,
        feature_names: Option<&[String]>,
    ) -> ExplainResult<BTreeMap<String, f64>> {
        let state = self.state(name)?;
        let mean_abs = mean_abs(&self.contribution_matrix(&state, instances)?);
        Ok(mean_abs
            .iter()
            .enumerate()
            .map(|(i, v)| (feature_label(feature_names, i), *v))
            .collect())
    }

    /// Contributions of the `max_display` most important features
    pub fn summary_plot_data(
        &self,
        name: &str,
        instances: &Array2<f64>,
        feature_names: Option<&[String]>,
        max_display: usize,
    ) -> ExplainResult<SummaryPlotData> {
        let state = self.state(name)?;
        let matrix = self.contribution_matrix(&state, instances)?;
        let importance = mean_abs(&matrix);

        let mut top = rank_by_magnitude(importance.as_slice().unwrap_or(&[]));
        top.truncate(max_display);

        Ok(SummaryPlotData {
            values: matrix.select(Axis(1), &top).rows().into_iter().map(|r| r.to_vec()).collect(),
            feature_values: instances
                .select(Axis(1), &top)
                .rows()
                .into_iter()
                .map(|r| r.to_vec())
                .collect(),
            feature_importance: top.iter().map(|&i| importance[i]).collect(),
            feature_names: feature_names.map(|n| top.iter().map(|&i| feature_label(Some(n), i)).collect()),
            feature_indices: top,
        })
    }

    fn contribution_matrix(&self, state: &ExplainerState, instances: &Array2<f64>) -> ExplainResult<Array2<f64>> {
        let budget = ExplainBudget::unbounded();
        let rows = instances
            .rows()
            .into_iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|row| self.contributions(state, &row.to_owned(), &budget))
            .collect::<ExplainResult<Vec<Vec<f64>>>>()?;

        let width = instances.ncols();
        Ok(Array2::from_shape_fn((rows.len(), width), |(i, j)| rows[i][j]))
    }

    fn contributions(
        &self,
        state: &ExplainerState,
        instance: &Array1<f64>,
        budget: &ExplainBudget,
    ) -> ExplainResult<Vec<f64>> {
        let n_features = state.model.feature_names().len();
        if instance.len() != n_features {
            return Err(ExplainError::Failed(format!(
                "instance has {} features, model expects {}",
                instance.len(),
                n_features
            )));
        }
        budget.check()?;

        match &state.backend {
            Backend::Tree => {
                let scaled = scale_one(&state.model, instance)?;
                let trees = state.model.trees();
                let mut phi = trees
                    .par_iter()
                    .map(|tree| tree_shap(tree, &scaled, state.output))
                    .reduce(
                        || vec![0.0; n_features],
                        |mut acc, part| {
                            acc.iter_mut().zip(part).for_each(|(a, p)| *a += p);
                            acc
                        },
                    );
                let n_trees = trees.len().max(1) as f64;
                phi.iter_mut().for_each(|v| *v /= n_trees);
                Ok(phi)
            }
            Backend::Linear { coef, mean } => {
                let scaled = Array1::from_vec(scale_one(&state.model, instance)?);
                Ok((coef * &(&scaled - mean)).to_vec())
            }
            Backend::Sampling { background } => self.sample_contributions(state, background, instance, budget),
        }
    }

    /// Permutation Shapley estimate.
    ///
    /// Every background row is paired with the same number of random
    /// feature orderings, so the contributions sum exactly to
    /// `f(x) - mean(f(background))`.
    fn sample_contributions(
        &self,
        state: &ExplainerState,
        background: &Array2<f64>,
        instance: &Array1<f64>,
        budget: &ExplainBudget,
    ) -> ExplainResult<Vec<f64>> {
        let n_features = instance.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut phi = vec![0.0; n_features];
        let chain = n_features + 1;

        for base in background.rows() {
            budget.check()?;

            let orders: Vec<Vec<usize>> = (0..self.permutations)
                .map(|_| {
                    let mut order: Vec<usize> = (0..n_features).collect();
                    order.shuffle(&mut rng);
                    order
                })
                .collect();

            let mut rows = Array2::zeros((self.permutations * chain, n_features));
            for (p, order) in orders.iter().enumerate() {
                let mut current = base.to_owned();
                rows.row_mut(p * chain).assign(&current);
                for (step, &feature) in order.iter().enumerate() {
                    current[feature] = instance[feature];
                    rows.row_mut(p * chain + step + 1).assign(&current);
                }
            }

            let scores = state
                .model
                .score_rows(&rows)
                .map_err(|e| ExplainError::Failed(e.to_string()))?;
            let column = scores.column(state.output);

            for (p, order) in orders.iter().enumerate() {
                for (step, &feature) in order.iter().enumerate() {
                    let before = column[p * chain + step];
                    let after = column[p * chain + step + 1];
                    phi[feature] += after - before;
                }
            }
        }

        let draws = (background.nrows() * self.permutations).max(1) as f64;
        phi.iter_mut().for_each(|v| *v /= draws);
        Ok(phi)
    }
}

fn build_state(model: Arc<Model>, background: Option<&Array2<f64>>) -> ExplainResult<ExplainerState> {
    if !model.is_trained() {
        return Err(ExplainError::Failed("model is not trained".to_string()));
    }
    let output = model.explained_output();
    let background = background
        .or_else(|| model.background())
        .map(|b| b.slice(s![..b.nrows().min(BACKGROUND_ROWS), ..]).to_owned());

    let (backend, expected_value) = match model_structure(&model) {
        ModelStructure::TreeEnsemble(trees) => {
            if trees.is_empty() {
                return Err(ExplainError::Failed("model has no fitted trees".to_string()));
            }
            let expected = trees.iter().map(|t| tree_expected_value(t, output)).sum::<f64>() / trees.len() as f64;
            (Backend::Tree, expected)
        }
        ModelStructure::Linear { coef, intercept } => {
            let mean = match &background {
                Some(b) if b.nrows() > 0 => model
                    .scale_rows(b)
                    .map_err(|e| ExplainError::Failed(e.to_string()))?
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(coef.len())),
                _ => Array1::zeros(coef.len()),
            };
            let expected = coef.dot(&mean) + intercept;
            (Backend::Linear { coef, mean }, expected)
        }
        ModelStructure::Opaque => {
            let background = background
                .filter(|b| b.nrows() > 0)
                .ok_or_else(|| ExplainError::Failed("sampling needs background rows".to_string()))?;
            let scores = model
                .score_rows(&background)
                .map_err(|e| ExplainError::Failed(e.to_string()))?;
            let expected = scores.column(output).mean().unwrap_or(0.0);
            (Backend::Sampling { background }, expected)
        }
    };

    Ok(ExplainerState {
        model,
        backend,
        output,
        expected_value,
    })
}

fn scale_one(model: &Model, instance: &Array1<f64>) -> ExplainResult<Vec<f64>> {
    let scaled = model
        .scale_rows(&instance.clone().insert_axis(Axis(0)))
        .map_err(|e| ExplainError::Failed(e.to_string()))?;
    Ok(scaled.row(0).to_vec())
}

fn mean_abs(matrix: &Array2<f64>) -> Array1<f64> {
    matrix
        .mapv(f64::abs)
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(matrix.ncols()))
}
