//! Attribution by perturbation (local surrogate)
//!
//! Neighbours of an instance are drawn from per-feature quartile bins of the
//! training data, scored with the model's prediction function and weighted
//! by their distance to the instance. A weighted ridge regression over the
//! "same bin as the instance" indicators is the surrogate; its coefficients
//! are the explanation.

use super::{rank_by_magnitude, ExplainBudget, ExplainError, ExplainResult};
use crate::error::Result;
use crate::training::linalg::solve_spd;
use ndarray::{Array1, Array2, Axis};
use parking_lot::RwLock;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rows scored per prediction call; the budget is polled between chunks
const SCORING_CHUNK: usize = 256;

/// Instances averaged by [`PerturbationExplainer::get_feature_importance`]
const MAX_IMPORTANCE_INSTANCES: usize = 20;

const RIDGE_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationMode {
    Classification,
    Regression,
}

impl fmt::Display for PerturbationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerturbationMode::Classification => f.write_str("classification"),
            PerturbationMode::Regression => f.write_str("regression"),
        }
    }
}

/// Local surrogate fitted around one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationExplanation {
    /// `(feature description, weight)` by descending `|weight|`
    pub explanation_list: Vec<(String, f64)>,
    /// Surrogate output at the instance
    pub local_prediction: f64,
    pub intercept: f64,
    /// Weighted R² of the surrogate on the neighbourhood
    pub score: f64,
    /// `(feature index, weight)` in the same order as `explanation_list`
    pub local_exp: Vec<(usize, f64)>,
    pub feature_contributions: BTreeMap<String, f64>,
    /// Output column that was explained
    pub explained_label: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationInfo {
    pub explainer_type: String,
    pub model_name: String,
    pub feature_names: Vec<String>,
    pub class_names: Option<Vec<String>>,
    pub mode: PerturbationMode,
    pub available: bool,
}

#[derive(Debug, Clone)]
struct Bin {
    freq: f64,
    mean: f64,
    std: f64,
    min: f64,
    max: f64,
}

/// Quartile discretisation of one training column
#[derive(Debug, Clone)]
struct FeatureBins {
    thresholds: Vec<f64>,
    bins: Vec<Bin>,
    constant: Option<f64>,
}

impl FeatureBins {
    fn fit(column: &[f64]) -> Self {
        let mut sorted = column.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let lo = sorted.first().copied().unwrap_or(0.0);
        let hi = sorted.last().copied().unwrap_or(0.0);

        let mut thresholds: Vec<f64> = [0.25, 0.5, 0.75].iter().map(|&q| quantile(&sorted, q)).collect();
        thresholds.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

        let n_bins = thresholds.len() + 1;
        let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
        for &v in column {
            members[bin_index(&thresholds, v)].push(v);
        }

        let total = column.len().max(1) as f64;
        let bins = members
            .iter()
            .enumerate()
            .map(|(b, values)| {
                if values.is_empty() {
                    let min = if b == 0 { lo } else { thresholds[b - 1] };
                    let max = thresholds.get(b).copied().unwrap_or(hi);
                    return Bin { freq: 0.0, mean: (min + max) / 2.0, std: 0.0, min, max };
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                Bin {
                    freq: n / total,
                    mean,
                    std: var.sqrt(),
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();

        Self {
            thresholds,
            bins,
            constant: if (hi - lo).abs() < f64::EPSILON { Some(lo) } else { None },
        }
    }

    fn bin_of(&self, v: f64) -> usize {
        bin_index(&self.thresholds, v)
    }

    fn sample_bin(&self, rng: &mut ChaCha8Rng) -> usize {
        let draw: f64 = rng.gen();
        let mut acc = 0.0;
        for (b, bin) in self.bins.iter().enumerate() {
            acc += bin.freq;
            if draw < acc {
                return b;
            }
        }
        self.bins.iter().rposition(|b| b.freq > 0.0).unwrap_or(0)
    }

    /// Value drawn from a normal fitted to the bin, clamped to its range
    fn sample_value(&self, b: usize, rng: &mut ChaCha8Rng) -> f64 {
        let bin = &self.bins[b];
        if bin.std <= 0.0 {
            return bin.mean;
        }
        (bin.mean + bin.std * standard_normal(rng)).clamp(bin.min, bin.max)
    }

    fn describe(&self, name: &str, b: usize) -> String {
        if let Some(v) = self.constant {
            return format!("{} = {:.2}", name, v);
        }
        let last = self.thresholds.len();
        if b == 0 {
            format!("{} <= {:.2}", name, self.thresholds[0])
        } else if b == last {
            format!("{} > {:.2}", name, self.thresholds[last - 1])
        } else {
            format!("{:.2} < {} <= {:.2}", self.thresholds[b - 1], name, self.thresholds[b])
        }
    }
}

fn bin_index(thresholds: &[f64], v: f64) -> usize {
    thresholds.iter().filter(|&&t| t < v).count()
}

/// Linearly interpolated quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let below = pos.floor() as usize;
    let above = pos.ceil() as usize;
    sorted[below] + (sorted[above] - sorted[below]) * (pos - below as f64)
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

struct SamplerState {
    feature_names: Vec<String>,
    class_names: Option<Vec<String>>,
    mode: PerturbationMode,
    bins: Vec<FeatureBins>,
}

/// Registry of perturbation samplers keyed by model name
pub struct PerturbationExplainer {
    available: bool,
    seed: u64,
    explainers: RwLock<HashMap<String, Arc<SamplerState>>>,
}

impl Default for PerturbationExplainer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PerturbationExplainer {
    pub fn new(available: bool) -> Self {
        if !available {
            warn!("Perturbation explainer disabled");
        }
        Self {
            available,
            seed: 42,
            explainers: RwLock::new(HashMap::new()),
        }
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

    /// Discretise `training` (encoded, unscaled rows) and register a sampler
    /// under `name`. Classification mode when `class_names` is given.
    pub fn create_explainer(
        &self,
        training: &Array2<f64>,
        feature_names: &[String],
        class_names: Option<Vec<String>>,
        name: &str,
    ) -> bool {
        if !self.available {
            warn!(model = %name, "Perturbation explainer not available");
            return false;
        }
        if training.nrows() == 0 || training.ncols() != feature_names.len() {
            warn!(
                model = %name,
                rows = training.nrows(),
                columns = training.ncols(),
                names = feature_names.len(),
                "Failed to create perturbation explainer"
            );
            return false;
        }

        let bins = training
            .columns()
            .into_iter()
            .map(|c| FeatureBins::fit(&c.to_vec()))
            .collect();
        let mode = if class_names.is_some() {
            PerturbationMode::Classification
        } else {
            PerturbationMode::Regression
        };

        self.explainers.write().insert(
            name.to_string(),
            Arc::new(SamplerState {
                feature_names: feature_names.to_vec(),
                class_names,
                mode,
                bins,
            }),
        );
        info!(model = %name, mode = %mode, n_features = feature_names.len(), "Created perturbation explainer");
        true
    }

    pub fn remove_explainer(&self, name: &str) -> bool {
        let removed = self.explainers.write().remove(name).is_some();
        if removed {
            info!(model = %name, "Removed perturbation explainer");
        }
        removed
    }

    pub fn explainer_info(&self, name: &str) -> Option<PerturbationInfo> {
        self.explainers.read().get(name).map(|state| PerturbationInfo {
            explainer_type: "tabular".to_string(),
            model_name: name.to_string(),
            feature_names: state.feature_names.clone(),
            class_names: state.class_names.clone(),
            mode: state.mode,
            available: self.available,
        })
    }

    fn state(&self, name: &str) -> ExplainResult<Arc<SamplerState>> {
        if !self.available {
            return Err(ExplainError::Unavailable("perturbation explainer".to_string()));
        }
        self.explainers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ExplainError::NoExplainer(name.to_string()))
    }

    /// Explain one encoded, unscaled instance with a surrogate over at most
    /// `num_features` features, fitted on `num_samples` neighbours.
    pub fn explain_prediction<F>(
        &self,
        name: &str,
        instance: &Array1<f64>,
        predict_fn: &F,
        num_features: usize,
        num_samples: usize,
        budget: &ExplainBudget,
    ) -> ExplainResult<PerturbationExplanation>
    where
        F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync + ?Sized,
    {
        let state = self.state(name)?;
        let explanation = self
            .explain_with_state(&state, instance, predict_fn, num_features, num_samples, budget)
            .map_err(|e| {
                warn!(model = %name, error = %e, "Perturbation explanation failed");
                e
            })?;
        debug!(
            model = %name,
            score = explanation.score,
            n_features = explanation.local_exp.len(),
            "Perturbation explanation computed"
        );
        Ok(explanation)
    }

    /// Mean `|contribution|` per feature over up to 20 rows of `instances`.
    ///
    /// Instances whose explanation fails are skipped; features that never
    /// received a contribution score 0.
    pub fn get_feature_importance<F>(
        &self,
        name: &str,
        instances: &Array2<f64>,
        predict_fn: &F,
        num_features: usize,
        num_samples: usize,
    ) -> ExplainResult<BTreeMap<String, f64>>
    where
        F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync + ?Sized,
    {
        let state = self.state(name)?;
        let n = instances.nrows();
        let picked: Vec<usize> = if n > MAX_IMPORTANCE_INSTANCES {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            sample(&mut rng, n, MAX_IMPORTANCE_INSTANCES).into_vec()
        } else {
            (0..n).collect()
        };

        let budget = ExplainBudget::unbounded();
        let outcomes: Vec<ExplainResult<PerturbationExplanation>> = picked
            .par_iter()
            .map(|&i| {
                let row = instances.row(i).to_owned();
                self.explain_with_state(&state, &row, predict_fn, num_features, num_samples, &budget)
            })
            .collect();

        let mut appearances: HashMap<&str, Vec<f64>> = HashMap::new();
        for outcome in outcomes {
            match outcome {
                Ok(explanation) => {
                    for (feature, value) in &explanation.local_exp {
                        appearances
                            .entry(state.feature_names[*feature].as_str())
                            .or_default()
                            .push(value.abs());
                    }
                }
                Err(ExplainError::Cancelled) => return Err(ExplainError::Cancelled),
                Err(e) => debug!(model = %name, error = %e, "Skipping instance in importance"),
            }
        }

        Ok(state
            .feature_names
            .iter()
            .map(|f| {
                let mean = appearances
                    .get(f.as_str())
                    .map_or(0.0, |v| v.iter().sum::<f64>() / v.len() as f64);
                (f.clone(), mean)
            })
            .collect())
    }

    fn explain_with_state<F>(
        &self,
        state: &SamplerState,
        instance: &Array1<f64>,
        predict_fn: &F,
        num_features: usize,
        num_samples: usize,
        budget: &ExplainBudget,
    ) -> ExplainResult<PerturbationExplanation>
    where
        F: Fn(&Array2<f64>) -> Result<Array2<f64>> + Sync + ?Sized,
    {
        let d = state.bins.len();
        if instance.len() != d {
            return Err(ExplainError::Failed(format!(
                "instance has {} features, explainer expects {}",
                instance.len(),
                d
            )));
        }
        budget.check()?;

        let num_samples = num_samples.max(2);
        let instance_bins: Vec<usize> = state
            .bins
            .iter()
            .zip(instance.iter())
            .map(|(bins, &v)| bins.bin_of(v))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut data: Array2<f64> = Array2::zeros((num_samples, d));
        let mut binary: Array2<f64> = Array2::zeros((num_samples, d));
        data.row_mut(0).assign(instance);
        binary.row_mut(0).fill(1.0);
        for i in 1..num_samples {
            for (j, bins) in state.bins.iter().enumerate() {
                let b = bins.sample_bin(&mut rng);
                data[[i, j]] = bins.sample_value(b, &mut rng);
                if b == instance_bins[j] {
                    binary[[i, j]] = 1.0;
                }
            }
        }

        let mut chunks = Vec::with_capacity(num_samples / SCORING_CHUNK + 1);
        for start in (0..num_samples).step_by(SCORING_CHUNK) {
            budget.check()?;
            let end = (start + SCORING_CHUNK).min(num_samples);
            let block = data.slice(ndarray::s![start..end, ..]).to_owned();
            chunks.push(predict_fn(&block).map_err(|e| ExplainError::Failed(e.to_string()))?);
        }
        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        let scores = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| ExplainError::Failed(e.to_string()))?;

        let label = match state.mode {
            PerturbationMode::Classification if scores.ncols() >= 2 => 1,
            _ => 0,
        };
        if label >= scores.ncols() {
            return Err(ExplainError::Failed("prediction function returned no columns".to_string()));
        }
        let target = scores.column(label).to_owned();

        let width = 0.75 * (d as f64).sqrt();
        let weights: Array1<f64> = binary
            .rows()
            .into_iter()
            .map(|row| {
                let dist2 = row.iter().map(|v| (1.0 - v).powi(2)).sum::<f64>();
                (-dist2 / (width * width)).exp().sqrt()
            })
            .collect();

        let all: Vec<usize> = (0..d).collect();
        let full = weighted_ridge(&binary, &target, &weights, &all)?;
        let mut selected: Vec<usize> = rank_by_magnitude(full.coef.as_slice().unwrap_or(&[]));
        selected.truncate(num_features.max(1).min(d));
        let surrogate = weighted_ridge(&binary, &target, &weights, &selected)?;

        let local_prediction = surrogate.intercept + surrogate.coef.sum();
        let order = rank_by_magnitude(surrogate.coef.as_slice().unwrap_or(&[]));

        let mut explanation_list = Vec::with_capacity(order.len());
        let mut local_exp = Vec::with_capacity(order.len());
        let mut feature_contributions = BTreeMap::new();
        for k in order {
            let feature = selected[k];
            let weight = surrogate.coef[k];
            let description = state.bins[feature].describe(&state.feature_names[feature], instance_bins[feature]);
            feature_contributions.insert(extract_feature_name(&description, &state.feature_names), weight);
            explanation_list.push((description, weight));
            local_exp.push((feature, weight));
        }

        Ok(PerturbationExplanation {
            explanation_list,
            local_prediction,
            intercept: surrogate.intercept,
            score: surrogate.score,
            local_exp,
            feature_contributions,
            explained_label: label,
        })
    }
}

struct Surrogate {
    coef: Array1<f64>,
    intercept: f64,
    score: f64,
}

/// Weighted ridge regression of `y` on the `columns` of `x`, with intercept
fn weighted_ridge(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    columns: &[usize],
) -> ExplainResult<Surrogate> {
    let x = x.select(Axis(1), columns);
    let total = w.sum().max(f64::MIN_POSITIVE);
    let x_mean = x.t().dot(w) / total;
    let y_mean = y.dot(w) / total;

    let xc = &x - &x_mean.view().insert_axis(Axis(0));
    let yc = y - y_mean;
    let xw = &xc * &w.view().insert_axis(Axis(1));

    let mut gram = xw.t().dot(&xc);
    for i in 0..gram.nrows() {
        gram[[i, i]] += RIDGE_ALPHA;
    }
    let coef = solve_spd(&gram, &xw.t().dot(&yc)).map_err(|e| ExplainError::Failed(e.to_string()))?;
    let intercept = y_mean - x_mean.dot(&coef);

    let fitted = x.dot(&coef) + intercept;
    let ss_res = (&(y - &fitted)).mapv(|r| r * r).dot(w);
    let ss_tot = yc.mapv(|r| r * r).dot(w);
    let score = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res <= f64::EPSILON {
        1.0
    } else {
        0.0
    };

    Ok(Surrogate { coef, intercept, score })
}

/// Longest known feature name found in `description`, else its first token
fn extract_feature_name(description: &str, feature_names: &[String]) -> String {
    feature_names
        .iter()
        .filter(|n| !n.is_empty() && description.contains(n.as_str()))
        .max_by_key(|n| n.len())
        .cloned()
        .unwrap_or_else(|| {
            description
                .split_whitespace()
                .next()
                .unwrap_or(description)
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainability::prediction_fn;
    use crate::models::{Model, ModelKind, PredictiveModel};
    use polars::prelude::*;

    fn names() -> Vec<String> {
        vec!["funding_amount".to_string(), "funding".to_string(), "team_size".to_string()]
    }

    fn training() -> Array2<f64> {
        Array2::from_shape_fn((120, 3), |(i, j)| match j {
            0 => (i % 40) as f64,
            1 => ((i * 7) % 11) as f64,
            _ => 5.0,
        })
    }

    /// Probability of class 1 rises with the first column only
    fn logistic(x: &Array2<f64>) -> Result<Array2<f64>> {
        let p = x.column(0).mapv(|v| 1.0 / (1.0 + (-(v - 20.0) / 4.0).exp()));
        let mut out = Array2::zeros((x.nrows(), 2));
        out.column_mut(1).assign(&p);
        out.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
        Ok(out)
    }

    fn explainer() -> PerturbationExplainer {
        let explainer = PerturbationExplainer::new(true);
        let classes = Some(vec!["fail".to_string(), "success".to_string()]);
        assert!(explainer.create_explainer(&training(), &names(), classes, "model"));
        explainer
    }

    #[test]
    fn test_quartile_bins() {
        let bins = FeatureBins::fit(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(bins.thresholds, vec![2.0, 3.0, 4.0]);
        assert_eq!(bins.bin_of(2.0), 0);
        assert_eq!(bins.bin_of(4.5), 3);
        assert_eq!(bins.describe("x", 0), "x <= 2.00");
        assert_eq!(bins.describe("x", 2), "3.00 < x <= 4.00");
        assert_eq!(bins.describe("x", 3), "x > 4.00");

        let constant = FeatureBins::fit(&[5.0, 5.0, 5.0]);
        assert_eq!(constant.describe("y", 0), "y = 5.00");
    }

    #[test]
    fn test_dominant_feature_ranks_first() {
        let explainer = explainer();
        let instance = Array1::from_vec(vec![35.0, 3.0, 5.0]);
        let explanation = explainer
            .explain_prediction("model", &instance, &logistic, 10, 500, &ExplainBudget::unbounded())
            .unwrap();

        assert_eq!(explanation.explained_label, 1);
        assert_eq!(explanation.local_exp[0].0, 0);
        assert!(explanation.local_exp[0].1 > 0.0);
        assert!(explanation.explanation_list[0].0.starts_with("funding_amount >"));
        assert!(explanation.score > 0.5);
        assert!(explanation.feature_contributions.contains_key("funding_amount"));

        let weights: f64 = explanation.local_exp.iter().map(|(_, w)| w).sum();
        assert!((explanation.local_prediction - explanation.intercept - weights).abs() < 1e-9);
    }

    #[test]
    fn test_num_features_limits_surrogate() {
        let explainer = explainer();
        let instance = Array1::from_vec(vec![5.0, 9.0, 5.0]);
        let explanation = explainer
            .explain_prediction("model", &instance, &logistic, 1, 200, &ExplainBudget::unbounded())
            .unwrap();
        assert_eq!(explanation.local_exp.len(), 1);
        assert_eq!(explanation.feature_contributions.len(), 1);
    }

    #[test]
    fn test_unknown_name_is_a_value() {
        let explainer = PerturbationExplainer::new(true);
        let result = explainer.explain_prediction(
            "missing",
            &Array1::zeros(3),
            &logistic,
            10,
            50,
            &ExplainBudget::unbounded(),
        );
        assert_eq!(result, Err(ExplainError::NoExplainer("missing".to_string())));

        let disabled = PerturbationExplainer::new(false);
        assert!(!disabled.create_explainer(&training(), &names(), None, "model"));
        assert!(matches!(
            disabled.get_feature_importance("model", &training(), &logistic, 5, 50),
            Err(ExplainError::Unavailable(_))
        ));
    }

    #[test]
    fn test_cancelled_budget_stops_sampling() {
        let explainer = explainer();
        let budget = ExplainBudget::unbounded();
        budget.cancel();
        let result = explainer.explain_prediction("model", &Array1::zeros(3), &logistic, 10, 1000, &budget);
        assert_eq!(result, Err(ExplainError::Cancelled));
    }

    #[test]
    fn test_feature_name_extraction() {
        let names = names();
        assert_eq!(extract_feature_name("0.50 < funding_amount <= 2.00", &names), "funding_amount");
        assert_eq!(extract_feature_name("funding <= 3.00", &names), "funding");
        assert_eq!(extract_feature_name("burn_rate > 1.00", &names), "burn_rate");
    }

    #[test]
    fn test_importance_covers_every_feature() {
        let explainer = explainer();
        let importance = explainer
            .get_feature_importance("model", &training(), &logistic, 2, 100)
            .unwrap();
        assert_eq!(importance.len(), 3);
        assert!(importance.values().all(|v| *v >= 0.0));
        assert!(importance["funding_amount"] > importance["team_size"]);
    }

    #[test]
    fn test_regression_model_through_adapter() {
        let a: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..60).map(|i| ((i * 3) % 7) as f64).collect();
        let y: Array1<f64> = (0..60).map(|i| 2.0 * i as f64).collect();
        let df = DataFrame::new(vec![
            Series::new("revenue".into(), a).into(),
            Series::new("burn".into(), b).into(),
        ])
        .unwrap();
        let mut model = Model::with_task(ModelKind::DecisionTree, crate::models::TaskType::Regression);
        assert!(model.train(&df, &y, 0.2).is_success());
        let model = Arc::new(model);

        let explainer = PerturbationExplainer::new(true);
        let background = model.background().unwrap().to_owned();
        let names = model.feature_names().to_vec();
        assert!(explainer.create_explainer(&background, &names, None, "tree"));
        assert_eq!(explainer.explainer_info("tree").unwrap().mode, PerturbationMode::Regression);

        let predict = prediction_fn(model);
        let explanation = explainer
            .explain_prediction("tree", &Array1::from_vec(vec![50.0, 2.0]), &*predict, 5, 300, &ExplainBudget::unbounded())
            .unwrap();
        assert_eq!(explanation.explained_label, 0);
        assert_eq!(explanation.local_exp[0].0, 0);

        assert!(explainer.remove_explainer("tree"));
        assert!(!explainer.has_explainer("tree"));
    }
}
