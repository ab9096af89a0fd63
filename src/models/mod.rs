//! Model abstraction
//!
//! Four tabular model families share one contract, [`PredictiveModel`], and
//! are held in the closed [`Model`] enum. Each variant owns its fitted
//! estimator plus a [`ModelCore`]: metadata, the fitted encoding/scaling
//! pipeline and a small background sample of training rows for explainers.
//!
//! Instances are encoded in feature-name order, scaled with the model's own
//! fitted scaler and handed to the estimator. Missing keys take neutral
//! values (see [`FeaturePipeline::encode_row`]).

mod decision_tree;
mod neural_network;
mod persistence;
mod qda;
mod random_forest;

pub use decision_tree::{DecisionTreeModel, TreeConfig, TreeInfo};
pub use neural_network::{MlpConfig, NeuralNetworkModel};
pub use persistence::{ArtifactEnvelope, ARTIFACT_FORMAT_VERSION, ARTIFACT_MAGIC};
pub use qda::{QdaConfig, QdaModel};
pub use random_forest::{ForestConfig, ForestInfo, RandomForestModel};

use crate::error::{DecisionError, Result};
use crate::features::{FeatureMap, FeatureValue};
use crate::preprocessing::FeaturePipeline;
use crate::training::{
    train_validation_split, CVResults, CVStrategy, CrossValidator, DecisionTree, ModelMetrics,
};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Version tag given to every freshly constructed model
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Upper bound on stored background rows
pub const BACKGROUND_ROWS: usize = 100;

/// Model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    RandomForest,
    NeuralNetwork,
    Qda,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::NeuralNetwork,
        ModelKind::Qda,
    ];

    /// Registry name of the family
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::NeuralNetwork => "neural_network",
            ModelKind::Qda => "qda",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "decision_tree" | "tree" | "dt" => Ok(ModelKind::DecisionTree),
            "random_forest" | "forest" | "rf" => Ok(ModelKind::RandomForest),
            "neural_network" | "mlp" | "nn" => Ok(ModelKind::NeuralNetwork),
            "qda" => Ok(ModelKind::Qda),
            other => Err(DecisionError::UnknownModel(other.to_string())),
        }
    }
}

/// Learning task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Classification,
    Regression,
}

/// Identity and training record of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub kind: ModelKind,
    pub task: TaskType,
    /// Ordered training columns; empty until trained
    pub feature_names: Vec<String>,
    pub trained: bool,
    pub performance_metrics: BTreeMap<String, f64>,
    pub training_date: Option<DateTime<Utc>>,
}

impl ModelMetadata {
    pub fn new(kind: ModelKind, task: TaskType, description: &str) -> Self {
        Self {
            name: kind.as_str().to_string(),
            version: DEFAULT_VERSION.to_string(),
            description: description.to_string(),
            kind,
            task,
            feature_names: Vec::new(),
            trained: false,
            performance_metrics: BTreeMap::new(),
            training_date: None,
        }
    }
}

/// State shared by every model variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCore {
    pub metadata: ModelMetadata,
    pub pipeline: FeaturePipeline,
    /// Encoded, unscaled training rows for explainer baselines
    pub background: Option<Array2<f64>>,
}

impl ModelCore {
    pub fn new(metadata: ModelMetadata, pipeline: FeaturePipeline) -> Self {
        Self {
            metadata,
            pipeline,
            background: None,
        }
    }
}

/// A single prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Class(i64),
    Value(f64),
}

impl Prediction {
    pub fn as_f64(&self) -> f64 {
        match self {
            Prediction::Class(c) => *c as f64,
            Prediction::Value(v) => *v,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Class(c) => write!(f, "{}", c),
            Prediction::Value(v) => write!(f, "{:.6}", v),
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Success,
    Failed,
}

/// What `train` reports back. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub status: TrainingStatus,
    pub message: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub feature_count: usize,
    pub cv_scores: Vec<f64>,
}

impl TrainingReport {
    fn failed(model_name: &str, message: String) -> Self {
        Self {
            model_name: model_name.to_string(),
            status: TrainingStatus::Failed,
            message: Some(message),
            metrics: BTreeMap::new(),
            training_samples: 0,
            validation_samples: 0,
            feature_count: 0,
            cv_scores: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TrainingStatus::Success
    }
}

/// Serializable model summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub task: TaskType,
    pub version: String,
    pub description: String,
    pub is_trained: bool,
    pub training_date: Option<DateTime<Utc>>,
    pub feature_count: usize,
    pub features: Vec<String>,
    pub performance_metrics: BTreeMap<String, f64>,
    /// Family-specific details
    pub details: serde_json::Value,
}

/// Shared model contract.
///
/// Implementors supply the estimator hooks; training, single and batch
/// prediction, importance and validation come from the provided methods.
pub trait PredictiveModel: Clone + Send + Sync {
    fn core(&self) -> &ModelCore;

    fn core_mut(&mut self) -> &mut ModelCore;

    /// Fit a fresh estimator on scaled rows, replacing the old one on success
    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Estimator output on scaled rows: class probabilities (one column per
    /// class) for classifiers, a single value column for regressors
    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Class labels aligned with the output columns; empty for regressors
    fn classes(&self) -> &[f64];

    /// Native importances in feature order
    fn estimator_importance(&self) -> Option<Array1<f64>>;

    /// Family-specific summary details
    fn details(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Folds of cross-validation run during training; 0 disables it
    fn cv_folds(&self) -> usize {
        0
    }

    /// Fitted trees, for families that are tree ensembles
    fn trees(&self) -> Vec<&DecisionTree> {
        Vec::new()
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.core().metadata
    }

    fn name(&self) -> &str {
        &self.core().metadata.name
    }

    fn kind(&self) -> ModelKind {
        self.core().metadata.kind
    }

    fn task(&self) -> TaskType {
        self.core().metadata.task
    }

    fn version(&self) -> &str {
        &self.core().metadata.version
    }

    fn is_trained(&self) -> bool {
        self.core().metadata.trained
    }

    fn feature_names(&self) -> &[String] {
        &self.core().metadata.feature_names
    }

    /// Background rows (encoded, unscaled) kept from training
    fn background(&self) -> Option<&Array2<f64>> {
        self.core().background.as_ref()
    }

    /// Train on a frame. Never fails: problems come back in the report and
    /// leave the previously fitted state untouched.
    fn train(&mut self, x: &DataFrame, y: &Array1<f64>, validation_split: f64) -> TrainingReport {
        let name = self.name().to_string();
        info!(model = %name, rows = x.height(), columns = x.width(), "Training started");

        let mut candidate = self.clone();
        match candidate.try_train(x, y, validation_split) {
            Ok(report) => {
                *self = candidate;
                info!(
                    model = %name,
                    accuracy = ?report.metrics.get("accuracy"),
                    r2 = ?report.metrics.get("r2"),
                    "Training completed"
                );
                report
            }
            Err(e) => {
                warn!(model = %name, error = %e, "Training failed");
                TrainingReport::failed(&name, e.to_string())
            }
        }
    }

    /// Training body; mutates `self` freely, so callers run it on a copy
    fn try_train(&mut self, x: &DataFrame, y: &Array1<f64>, validation_split: f64) -> Result<TrainingReport> {
        let start = Instant::now();
        let names: Vec<String> = x
            .get_column_names()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        if names.is_empty() {
            return Err(DecisionError::DataError("training frame has no columns".to_string()));
        }
        if x.height() != y.len() {
            return Err(DecisionError::ShapeError {
                expected: format!("{} targets", x.height()),
                actual: format!("{} targets", y.len()),
            });
        }
        if x.height() < 4 {
            return Err(DecisionError::DataError(format!(
                "need at least 4 training rows, got {}",
                x.height()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(DecisionError::DataError("targets contain non-finite values".to_string()));
        }

        let task = self.task();
        let mut pipeline = self.core().pipeline.unfitted();
        let encoded = pipeline.fit_frame(x, &names)?;

        let split = validation_split.clamp(0.0, 0.9);
        let (train_idx, val_idx) =
            train_validation_split(y, split, task == TaskType::Classification, 42);

        let x_train_raw = encoded.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        pipeline.fit_scaler(&x_train_raw)?;
        let x_train = pipeline.transform(&x_train_raw)?;

        self.fit_estimator(&x_train, &y_train)?;

        let mut metrics = if val_idx.is_empty() {
            ModelMetrics::new()
        } else {
            let x_val = pipeline.transform(&encoded.select(Axis(0), &val_idx))?;
            let y_val = y.select(Axis(0), &val_idx);
            evaluate(self, &x_val, &y_val)?
        };

        let mut cv_scores = Vec::new();
        let folds = self.cv_folds();
        if folds >= 2 && x_train.nrows() >= folds * 2 {
            let cv = cross_validate(self, &x_train, &y_train, folds)?;
            metrics.cv_mean = Some(cv.mean_score);
            metrics.cv_std = Some(cv.std_score);
            cv_scores = cv.scores;
        }

        metrics.training_time_secs = start.elapsed().as_secs_f64();
        metrics.n_features = names.len();

        let background = sample_background(&x_train_raw, BACKGROUND_ROWS, 42);
        let metric_map = metrics.to_map();

        let core = self.core_mut();
        core.pipeline = pipeline;
        core.background = Some(background);
        core.metadata.feature_names = names.clone();
        core.metadata.performance_metrics = metric_map.clone();
        core.metadata.training_date = Some(Utc::now());
        core.metadata.trained = true;

        Ok(TrainingReport {
            model_name: core.metadata.name.clone(),
            status: TrainingStatus::Success,
            message: None,
            metrics: metric_map,
            training_samples: train_idx.len(),
            validation_samples: val_idx.len(),
            feature_count: names.len(),
            cv_scores,
        })
    }

    /// Encode an instance in training column order, without scaling
    fn encode(&self, features: &FeatureMap) -> Result<Array1<f64>> {
        if !self.is_trained() {
            return Err(DecisionError::NotTrained);
        }
        Ok(self.core().pipeline.encode_row(features, self.feature_names()))
    }

    /// Scale encoded rows with the fitted scaler
    fn scale_rows(&self, x_raw: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_trained() {
            return Err(DecisionError::NotTrained);
        }
        self.core().pipeline.transform(x_raw)
    }

    /// Estimator output for encoded, unscaled rows
    fn score_rows(&self, x_raw: &Array2<f64>) -> Result<Array2<f64>> {
        let x = self.scale_rows(x_raw)?;
        let output = self.estimator_output(&x)?;
        if output.iter().any(|v| !v.is_finite()) {
            return Err(DecisionError::ComputationError(
                "model produced a non-finite score".to_string(),
            ));
        }
        Ok(output)
    }

    /// Output column explanations describe: the positive class for binary
    /// classifiers, class 0 for multiclass, the value for regressors
    fn explained_output(&self) -> usize {
        if self.task() == TaskType::Classification && self.classes().len() == 2 {
            1
        } else {
            0
        }
    }

    fn predict(&self, features: &FeatureMap) -> Result<Prediction> {
        let row = self.encode(features)?.insert_axis(Axis(0));
        let output = self.score_rows(&row)?;
        Ok(to_prediction(self, output.row(0).as_slice().unwrap_or(&[])))
    }

    /// Confidence: the top class probability, `None` for regressors
    fn predict_proba(&self, features: &FeatureMap) -> Result<Option<f64>> {
        let probabilities = self.class_probabilities(features)?;
        Ok(probabilities.map(|p| p.values().cloned().fold(0.0, f64::max)))
    }

    /// Probability per class label; `None` for regressors
    fn class_probabilities(&self, features: &FeatureMap) -> Result<Option<BTreeMap<i64, f64>>> {
        let row = self.encode(features)?.insert_axis(Axis(0));
        let output = self.score_rows(&row)?;
        if self.task() == TaskType::Regression {
            return Ok(None);
        }
        Ok(Some(
            self.classes()
                .iter()
                .zip(output.row(0).iter())
                .map(|(c, p)| (c.round() as i64, *p))
                .collect(),
        ))
    }

    /// Sequential fan-out over [`PredictiveModel::predict`], order preserved
    fn predict_batch(&self, batch: &[FeatureMap]) -> Vec<Result<Prediction>> {
        batch.iter().map(|features| self.predict(features)).collect()
    }

    fn predict_proba_batch(&self, batch: &[FeatureMap]) -> Vec<Result<Option<f64>>> {
        batch.iter().map(|features| self.predict_proba(features)).collect()
    }

    /// Importance per training feature; empty when untrained
    fn get_feature_importance(&self) -> BTreeMap<String, f64> {
        if !self.is_trained() {
            return BTreeMap::new();
        }
        match self.estimator_importance() {
            Some(importance) => self
                .feature_names()
                .iter()
                .cloned()
                .zip(importance.iter().map(|v| v.max(0.0)))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    /// Importances sorted descending
    fn ranked_feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self.get_feature_importance().into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// True when untrained or when no training feature is missing
    fn validate_features(&self, features: &FeatureMap) -> bool {
        let missing: Vec<&String> = self
            .feature_names()
            .iter()
            .filter(|name| !features.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            debug!(model = %self.name(), missing = ?missing, "Missing features");
        }
        missing.is_empty()
    }

    /// Like [`PredictiveModel::validate_features`] but names what is missing
    fn require_features(&self, features: &FeatureMap) -> Result<()> {
        let missing: Vec<&str> = self
            .feature_names()
            .iter()
            .filter(|name| !features.contains_key(*name))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DecisionError::InvalidFeatures(format!("missing {}", missing.join(", "))))
        }
    }

    /// Plausible synthetic input keyed by the training feature names
    fn dummy_features(&self) -> FeatureMap {
        self.feature_names()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = self
                    .core()
                    .pipeline
                    .probe_value(idx, name)
                    .unwrap_or_else(|| dummy_value(name));
                (name.clone(), value)
            })
            .collect()
    }

    fn summary(&self) -> ModelSummary {
        let meta = self.metadata();
        ModelSummary {
            name: meta.name.clone(),
            kind: meta.kind,
            task: meta.task,
            version: meta.version.clone(),
            description: meta.description.clone(),
            is_trained: meta.trained,
            training_date: meta.training_date,
            feature_count: meta.feature_names.len(),
            features: meta.feature_names.clone(),
            performance_metrics: meta.performance_metrics.clone(),
            details: self.details(),
        }
    }
}

/// Synthetic value chosen from keywords in a feature name
pub fn dummy_value(name: &str) -> FeatureValue {
    let lower = name.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

    if has(&["amount", "funding", "revenue", "valuation"]) {
        FeatureValue::Number(1_000_000.0)
    } else if has(&["age", "years", "months"]) {
        FeatureValue::Number(2.0)
    } else if has(&["count", "number", "total"]) {
        FeatureValue::Number(5.0)
    } else if has(&["rate", "ratio", "percentage"]) {
        FeatureValue::Number(0.1)
    } else if lower.ends_with("_categorical") {
        FeatureValue::Text("category_a".to_string())
    } else {
        FeatureValue::Number(1.0)
    }
}

fn to_prediction<M: PredictiveModel>(model: &M, output: &[f64]) -> Prediction {
    match model.task() {
        TaskType::Regression => Prediction::Value(output.first().copied().unwrap_or(0.0)),
        TaskType::Classification => {
            let best = crate::training::decision_tree::argmax(output).unwrap_or(0);
            let label = model.classes().get(best).copied().unwrap_or(0.0);
            Prediction::Class(label.round() as i64)
        }
    }
}

/// Held-out metrics for a fitted estimator on scaled rows
fn evaluate<M: PredictiveModel>(model: &M, x: &Array2<f64>, y: &Array1<f64>) -> Result<ModelMetrics> {
    let output = model.estimator_output(x)?;
    match model.task() {
        TaskType::Regression => Ok(ModelMetrics::compute_regression(y, &output.column(0).to_owned())),
        TaskType::Classification => {
            let predicted: Array1<f64> = output
                .rows()
                .into_iter()
                .map(|row| {
                    let values = row.to_vec();
                    let best = crate::training::decision_tree::argmax(&values).unwrap_or(0);
                    model.classes().get(best).copied().unwrap_or(0.0)
                })
                .collect();
            let positive = (model.classes().len() == 2).then(|| output.column(1).to_owned());
            Ok(ModelMetrics::compute_classification(y, &predicted, positive.as_ref()))
        }
    }
}

/// K-fold scores (accuracy or R²) on the scaled training split
fn cross_validate<M: PredictiveModel>(
    model: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: usize,
) -> Result<CVResults> {
    let strategy = match model.task() {
        TaskType::Classification => CVStrategy::StratifiedKFold { n_splits: folds, shuffle: true },
        TaskType::Regression => CVStrategy::KFold { n_splits: folds, shuffle: true },
    };
    let splits = CrossValidator::new(strategy).with_random_state(42).split(x.nrows(), Some(y))?;

    let mut scores = Vec::with_capacity(splits.len());
    for split in splits {
        let mut fold_model = model.clone();
        fold_model.fit_estimator(
            &x.select(Axis(0), &split.train_indices),
            &y.select(Axis(0), &split.train_indices),
        )?;
        let metrics = evaluate(
            &fold_model,
            &x.select(Axis(0), &split.test_indices),
            &y.select(Axis(0), &split.test_indices),
        )?;
        if let Some(score) = metrics.primary_score() {
            scores.push(score);
        }
    }
    Ok(CVResults::from_scores(scores))
}

/// Up to `max_rows` rows drawn without replacement
fn sample_background(x: &Array2<f64>, max_rows: usize, seed: u64) -> Array2<f64> {
    if x.nrows() <= max_rows {
        return x.clone();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = sample(&mut rng, x.nrows(), max_rows).into_vec();
    rows.sort_unstable();
    x.select(Axis(0), &rows)
}

/// Closed set of model families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Model {
    DecisionTree(DecisionTreeModel),
    RandomForest(RandomForestModel),
    NeuralNetwork(NeuralNetworkModel),
    Qda(QdaModel),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Model::DecisionTree($m) => $body,
            Model::RandomForest($m) => $body,
            Model::NeuralNetwork($m) => $body,
            Model::Qda($m) => $body,
        }
    };
}

impl Model {
    /// Untrained classifier of the given family with default settings
    pub fn new(kind: ModelKind) -> Self {
        Self::with_task(kind, TaskType::Classification)
    }

    /// Untrained model of the given family and task.
    ///
    /// QDA only classifies, so it ignores a regression request.
    pub fn with_task(kind: ModelKind, task: TaskType) -> Self {
        match kind {
            ModelKind::DecisionTree => Model::DecisionTree(DecisionTreeModel::new(task)),
            ModelKind::RandomForest => Model::RandomForest(RandomForestModel::new(task)),
            ModelKind::NeuralNetwork => Model::NeuralNetwork(NeuralNetworkModel::new(task)),
            ModelKind::Qda => Model::Qda(QdaModel::new()),
        }
    }

    /// Rename the model (its registry key)
    pub fn named(mut self, name: &str) -> Self {
        self.core_mut().metadata.name = name.to_string();
        self
    }

    /// Replace the version tag
    pub fn set_version(&mut self, version: &str) {
        self.core_mut().metadata.version = version.to_string();
    }

    /// Save to `path` atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save(self, path)
    }

    /// Decode an artifact into a new model
    pub fn load(path: &Path) -> Result<Model> {
        persistence::load(path, None)
    }

    /// Replace `self` with the artifact at `path`, all or nothing.
    ///
    /// The artifact must hold a model of the same family.
    pub fn load_into(&mut self, path: &Path) -> Result<()> {
        let loaded = persistence::load(path, Some(self.kind()))?;
        *self = loaded;
        Ok(())
    }

    /// Internal consistency of fitted state, checked after decoding
    pub fn check_consistency(&self) -> Result<()> {
        let meta = self.metadata();
        if !meta.trained {
            return Ok(());
        }
        if meta.feature_names.is_empty() {
            return Err(DecisionError::LoadError("trained model has no feature names".to_string()));
        }
        if !self.core().pipeline.is_fitted() {
            return Err(DecisionError::LoadError("trained model has an unfitted pipeline".to_string()));
        }
        if self.core().pipeline.column_types().len() != meta.feature_names.len() {
            return Err(DecisionError::LoadError(
                "pipeline width does not match feature names".to_string(),
            ));
        }
        let probe = Array2::zeros((1, meta.feature_names.len()));
        self.score_rows(&probe)
            .map(|_| ())
            .map_err(|e| DecisionError::LoadError(format!("estimator state is unusable: {}", e)))
    }
}

impl PredictiveModel for Model {
    fn core(&self) -> &ModelCore {
        dispatch!(self, m => m.core())
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        dispatch!(self, m => m.core_mut())
    }

    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit_estimator(x, y))
    }

    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        dispatch!(self, m => m.estimator_output(x))
    }

    fn classes(&self) -> &[f64] {
        dispatch!(self, m => m.classes())
    }

    fn estimator_importance(&self) -> Option<Array1<f64>> {
        dispatch!(self, m => m.estimator_importance())
    }

    fn details(&self) -> serde_json::Value {
        dispatch!(self, m => m.details())
    }

    fn cv_folds(&self) -> usize {
        dispatch!(self, m => m.cv_folds())
    }

    fn trees(&self) -> Vec<&DecisionTree> {
        dispatch!(self, m => m.trees())
    }

    fn train(&mut self, x: &DataFrame, y: &Array1<f64>, validation_split: f64) -> TrainingReport {
        dispatch!(self, m => m.train(x, y, validation_split))
    }

    fn predict_batch(&self, batch: &[FeatureMap]) -> Vec<Result<Prediction>> {
        dispatch!(self, m => m.predict_batch(batch))
    }
}
