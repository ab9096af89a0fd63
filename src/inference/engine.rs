//! Prediction engine
//!
//! Owns the model registry and routes prediction, explanation, health and
//! retrain requests. Scoring and explanation run on the blocking pool so
//! callers on the async runtime are never stalled by CPU work.
//!
//! Models are shared as `Arc<Model>`: requests clone the `Arc` and score a
//! snapshot, retraining fits a private copy and swaps it in.

use super::EngineConfig;
use crate::error::{DecisionError, Result};
use crate::explainability::{
    feature_label, prediction_fn, ContributionExplainer, ContributionExplanation, ExplainBudget,
    ExplainError, PerturbationExplainer, PerturbationExplanation,
};
use crate::features::{FeatureExtractor, FeatureMap, FeatureVector, RawFeatures};
use crate::models::{Model, ModelKind, ModelSummary, Prediction, PredictiveModel, TaskType, TrainingReport};
use crate::monitoring::{MetricsSummary, ServingMetrics};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use parking_lot::{Mutex, RwLock};
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One scored instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub id: Uuid,
    pub prediction: Prediction,
    pub confidence: Option<f64>,
    pub model_name: String,
    pub model_version: String,
    /// Extracted features the model scored
    pub features: FeatureVector,
    pub created_at: DateTime<Utc>,
}

/// Attribution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplanationMethod {
    #[serde(rename = "attribution-by-contribution")]
    Contribution,
    #[serde(rename = "attribution-by-perturbation")]
    Perturbation,
}

impl fmt::Display for ExplanationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplanationMethod::Contribution => f.write_str("attribution-by-contribution"),
            ExplanationMethod::Perturbation => f.write_str("attribution-by-perturbation"),
        }
    }
}

impl FromStr for ExplanationMethod {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "contribution" | "shap" | "attribution-by-contribution" => Ok(ExplanationMethod::Contribution),
            "perturbation" | "lime" | "attribution-by-perturbation" => Ok(ExplanationMethod::Perturbation),
            _ => Err(DecisionError::UnknownMethod(s.to_string())),
        }
    }
}

/// Signed credit of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub contribution: f64,
}

/// Ranked attributions for one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub method: ExplanationMethod,
    /// By descending `|contribution|`
    pub contributions: Vec<Attribution>,
    /// Expected value for contributions, surrogate intercept for perturbation
    pub baseline: Option<f64>,
    /// Model confidence on the explained instance
    pub confidence: Option<f64>,
    pub model_name: String,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub contribution_detail: Option<ContributionExplanation>,
    pub perturbation_detail: Option<PerturbationExplanation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub models_loaded: usize,
    pub healthy_models: usize,
    /// `healthy` or `unhealthy: <reason>` per model
    pub model_status: BTreeMap<String, String>,
    pub contribution_explainer: bool,
    pub perturbation_explainer: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainReport {
    pub model_name: String,
    pub training_results: TrainingReport,
    /// Version after the run; unchanged when training failed
    pub new_version: String,
    pub training_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub predictions: MetricsSummary,
    pub explanations: MetricsSummary,
    pub models_loaded: usize,
    pub trained_models: usize,
    pub retrains: u64,
}

/// Clears the in-flight marker when a retrain ends, however it ends
struct RetrainGuard<'a> {
    inflight: &'a Mutex<HashSet<String>>,
    name: String,
}

impl<'a> RetrainGuard<'a> {
    fn acquire(inflight: &'a Mutex<HashSet<String>>, name: &str) -> Result<Self> {
        if !inflight.lock().insert(name.to_string()) {
            return Err(DecisionError::RetrainInProgress(name.to_string()));
        }
        Ok(Self {
            inflight,
            name: name.to_string(),
        })
    }
}

impl Drop for RetrainGuard<'_> {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.name);
    }
}

/// Registry-owning orchestrator
pub struct PredictionEngine {
    config: EngineConfig,
    models: RwLock<HashMap<String, Arc<Model>>>,
    extractor: FeatureExtractor,
    contribution: Arc<ContributionExplainer>,
    perturbation: Arc<PerturbationExplainer>,
    retraining: Mutex<HashSet<String>>,
    prediction_metrics: ServingMetrics,
    explanation_metrics: ServingMetrics,
    retrains: AtomicU64,
}

impl fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("config", &self.config)
            .field("models", &self.model_names())
            .finish()
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PredictionEngine {
    /// Engine with one untrained model of every family, registered under
    /// the family name, for the configured task
    pub fn new(config: EngineConfig) -> Self {
        let task = config.training.task;
        let models = ModelKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), Arc::new(Model::with_task(*kind, task))))
            .collect::<HashMap<_, _>>();

        let engine = Self {
            contribution: Arc::new(ContributionExplainer::new(config.explainers.contribution)),
            perturbation: Arc::new(PerturbationExplainer::new(config.explainers.perturbation)),
            models: RwLock::new(models),
            extractor: FeatureExtractor::new(),
            retraining: Mutex::new(HashSet::new()),
            prediction_metrics: ServingMetrics::new(10_000),
            explanation_metrics: ServingMetrics::new(1_000),
            retrains: AtomicU64::new(0),
            config,
        };
        info!(models = engine.models.read().len(), "Prediction engine initialized");
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn contribution_explainer(&self) -> &ContributionExplainer {
        &self.contribution
    }

    pub fn perturbation_explainer(&self) -> &PerturbationExplainer {
        &self.perturbation
    }

    /// Registered names, sorted
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of the model registered under `name`
    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DecisionError::UnknownModel(name.to_string()))
    }

    /// Add or replace a model under its own name; returns the replaced one
    pub fn register_model(&self, model: Model) -> Option<Arc<Model>> {
        let name = model.name().to_string();
        info!(model = %name, kind = %model.kind(), version = %model.version(), trained = model.is_trained(), "Model registered");
        let previous = self.models.write().insert(name.clone(), Arc::new(model));
        self.invalidate_explainers(&name);
        previous
    }

    /// Load every `*.bin` artifact in the configured directory.
    ///
    /// Unreadable artifacts are skipped with a warning; a missing directory
    /// loads nothing. Returns the number of models registered.
    pub fn load_models_from_dir(&self) -> Result<usize> {
        let dir = self.config.models_dir.clone();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Models directory not found");
            return Ok(0);
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "bin"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match Model::load(&path) {
                Ok(model) => {
                    self.register_model(model);
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping model artifact"),
            }
        }
        info!(dir = %dir.display(), loaded, "Loaded models from directory");
        Ok(loaded)
    }

    /// Extract features from `raw` and score them with `name`.
    ///
    /// `version` is echoed in the result; the registered model is used
    /// whatever tag is asked for.
    pub async fn predict(&self, name: &str, raw: &RawFeatures, version: Option<&str>) -> Result<PredictionResult> {
        let start = Instant::now();
        let outcome = self.predict_inner(name, raw, version).await;
        match &outcome {
            Ok(result) => {
                self.prediction_metrics.record(start.elapsed().as_secs_f64() * 1000.0, 1);
                debug!(model = %name, prediction = %result.prediction, confidence = ?result.confidence, "Prediction served");
            }
            Err(e) => {
                self.prediction_metrics.record_error();
                warn!(model = %name, error = %e, "Prediction failed");
            }
        }
        outcome
    }

    async fn predict_inner(&self, name: &str, raw: &RawFeatures, version: Option<&str>) -> Result<PredictionResult> {
        let model = self.model(name)?;
        let features = self.extractor.transform(raw);
        let map = features.to_feature_map();

        let scoring = Arc::clone(&model);
        let (prediction, confidence) = tokio::task::spawn_blocking(move || -> Result<(Prediction, Option<f64>)> {
            Ok((scoring.predict(&map)?, scoring.predict_proba(&map)?))
        })
        .await
        .map_err(|e| DecisionError::ComputationError(format!("prediction task failed: {}", e)))
        .and_then(|r| r)
        .map_err(|e| DecisionError::prediction_failed(name, e))?;

        Ok(PredictionResult {
            id: Uuid::new_v4(),
            prediction,
            confidence,
            model_name: name.to_string(),
            model_version: resolve_version(&model, version),
            features,
            created_at: Utc::now(),
        })
    }

    /// Score many payloads. Order and length match `raws`; each slot holds
    /// its own outcome. Only an unknown model fails the whole call.
    pub async fn predict_batch(
        &self,
        name: &str,
        raws: &[RawFeatures],
        version: Option<&str>,
    ) -> Result<Vec<Result<PredictionResult>>> {
        let start = Instant::now();
        let model = self.model(name)?;
        let model_version = resolve_version(&model, version);
        let mut results = Vec::with_capacity(raws.len());

        for chunk in raws.chunks(self.config.batch_chunk.max(1)) {
            let vectors: Vec<FeatureVector> = chunk.iter().map(|raw| self.extractor.transform(raw)).collect();
            let maps: Vec<FeatureMap> = vectors.iter().map(FeatureVector::to_feature_map).collect();

            let scoring = Arc::clone(&model);
            let scored = tokio::task::spawn_blocking(move || {
                (scoring.predict_batch(&maps), scoring.predict_proba_batch(&maps))
            })
            .await;

            match scored {
                Ok((predictions, confidences)) => {
                    for ((features, prediction), confidence) in vectors.into_iter().zip(predictions).zip(confidences) {
                        results.push(match (prediction, confidence) {
                            (Ok(prediction), Ok(confidence)) => Ok(PredictionResult {
                                id: Uuid::new_v4(),
                                prediction,
                                confidence,
                                model_name: name.to_string(),
                                model_version: model_version.clone(),
                                features,
                                created_at: Utc::now(),
                            }),
                            (Err(e), _) | (_, Err(e)) => Err(DecisionError::prediction_failed(name, e)),
                        });
                    }
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "Batch chunk failed");
                    for _ in 0..chunk.len() {
                        results.push(Err(DecisionError::prediction_failed(
                            name,
                            DecisionError::ComputationError(format!("prediction task failed: {}", e)),
                        )));
                    }
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        self.prediction_metrics.record(start.elapsed().as_secs_f64() * 1000.0, succeeded as u64);
        info!(model = %name, items = raws.len(), succeeded, "Batch prediction completed");
        Ok(results)
    }

    /// Explain the prediction of `name` on `raw` with `method`
    /// (`contribution`/`shap` or `perturbation`/`lime`).
    ///
    /// Bounded by the configured timeout; a slow sampler is cancelled and
    /// the call fails with [`DecisionError::ExplanationTimedOut`].
    pub async fn explain(&self, name: &str, raw: &RawFeatures, method: &str) -> Result<Explanation> {
        let start = Instant::now();
        let outcome = self.explain_inner(name, raw, method).await;
        match &outcome {
            Ok(explanation) => {
                self.explanation_metrics.record(start.elapsed().as_secs_f64() * 1000.0, 1);
                debug!(model = %name, method = %explanation.method, features = explanation.contributions.len(), "Explanation served");
            }
            Err(e) => {
                self.explanation_metrics.record_error();
                warn!(model = %name, method = %method, error = %e, "Explanation failed");
            }
        }
        outcome
    }

    async fn explain_inner(&self, name: &str, raw: &RawFeatures, method: &str) -> Result<Explanation> {
        let method: ExplanationMethod = method.parse()?;
        let model = self.model(name)?;
        let map = self.extractor.transform(raw).to_feature_map();
        let instance = model.encode(&map).map_err(|e| DecisionError::prediction_failed(name, e))?;
        let confidence = model.predict_proba(&map).ok().flatten();

        let timeout = self.config.explain_timeout();
        let budget = ExplainBudget::with_timeout(timeout);
        let task = {
            let model = Arc::clone(&model);
            let name = name.to_string();
            let budget = budget.clone();
            let contribution = Arc::clone(&self.contribution);
            let perturbation = Arc::clone(&self.perturbation);
            let (num_samples, num_features) = (self.config.perturbation_samples, self.config.perturbation_features);
            tokio::task::spawn_blocking(move || match method {
                ExplanationMethod::Contribution => {
                    explain_by_contribution(&contribution, &name, model, &instance, &budget).map(Detail::Contribution)
                }
                ExplanationMethod::Perturbation => explain_by_perturbation(
                    &perturbation,
                    &name,
                    model,
                    &instance,
                    num_features,
                    num_samples,
                    &budget,
                )
                .map(Detail::Perturbation),
            })
        };

        let timed_out = || DecisionError::ExplanationTimedOut(self.config.explain_timeout_ms);
        let detail = match tokio::time::timeout(timeout, task).await {
            Err(_) => {
                budget.cancel();
                return Err(timed_out());
            }
            Ok(Err(e)) => return Err(DecisionError::ComputationError(format!("explanation task failed: {}", e))),
            Ok(Ok(Err(ExplainError::Cancelled))) => return Err(timed_out()),
            Ok(Ok(Err(e))) => return Err(e.into()),
            Ok(Ok(Ok(detail))) => detail,
        };

        let names = model.feature_names();
        let mut explanation = Explanation {
            method,
            contributions: Vec::new(),
            baseline: None,
            confidence,
            model_name: name.to_string(),
            model_version: model.version().to_string(),
            created_at: Utc::now(),
            contribution_detail: None,
            perturbation_detail: None,
        };
        match detail {
            Detail::Contribution(c) => {
                explanation.contributions = c
                    .importance_ranking
                    .iter()
                    .map(|&i| Attribution {
                        feature: feature_label(Some(names), i),
                        contribution: c.values[i],
                    })
                    .collect();
                explanation.baseline = Some(c.expected_value);
                explanation.contribution_detail = Some(c);
            }
            Detail::Perturbation(p) => {
                explanation.contributions = p
                    .local_exp
                    .iter()
                    .map(|&(i, w)| Attribution {
                        feature: feature_label(Some(names), i),
                        contribution: w,
                    })
                    .collect();
                explanation.baseline = Some(p.intercept);
                explanation.perturbation_detail = Some(p);
            }
        }
        Ok(explanation)
    }

    /// Score every model on its own dummy features
    pub async fn health_check(&self) -> HealthReport {
        let models: Vec<(String, Arc<Model>)> = self
            .models
            .read()
            .iter()
            .map(|(name, model)| (name.clone(), Arc::clone(model)))
            .collect();

        let model_status = tokio::task::spawn_blocking(move || {
            models
                .into_iter()
                .map(|(name, model)| {
                    let status = match model.predict(&model.dummy_features()) {
                        Ok(_) => "healthy".to_string(),
                        Err(e) => format!("unhealthy: {}", e),
                    };
                    (name, status)
                })
                .collect::<BTreeMap<String, String>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Health check task failed");
            BTreeMap::new()
        });

        let healthy_models = model_status.values().filter(|s| *s == "healthy").count();
        let models_loaded = self.models.read().len();
        let status = if healthy_models == models_loaded && model_status.len() == models_loaded {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        if status == HealthStatus::Degraded {
            warn!(healthy = healthy_models, total = models_loaded, "Engine degraded");
        }

        HealthReport {
            status,
            models_loaded,
            healthy_models,
            model_status,
            contribution_explainer: self.contribution.is_available(),
            perturbation_explainer: self.perturbation.is_available(),
        }
    }

    /// Retrain `name` on extracted `records` with one target per record.
    ///
    /// Fits a copy of the registered model and swaps it in on success,
    /// bumping the patch component of its version. A failed fit is reported
    /// in the returned report and leaves the registry untouched. Only one
    /// retrain per name may run at a time.
    pub async fn retrain(&self, name: &str, records: &[RawFeatures], targets: &[f64]) -> Result<RetrainReport> {
        let model = self.model(name)?;
        if records.len() != targets.len() {
            return Err(DecisionError::ValidationError(format!(
                "{} records but {} targets",
                records.len(),
                targets.len()
            )));
        }
        let _guard = RetrainGuard::acquire(&self.retraining, name)?;
        info!(model = %name, samples = records.len(), "Retrain started");

        let vectors: Vec<FeatureVector> = records.iter().map(|raw| self.extractor.transform(raw)).collect();
        let frame = feature_frame(&vectors)?;
        let y = Array1::from_vec(targets.to_vec());
        let split = self.config.training.validation_split;

        let mut candidate = (*model).clone();
        let (report, candidate) = tokio::task::spawn_blocking(move || {
            let report = candidate.train(&frame, &y, split);
            (report, candidate)
        })
        .await
        .map_err(|e| DecisionError::TrainingFailure(format!("training task failed: {}", e)))?;

        let new_version = if report.is_success() {
            let mut candidate = candidate;
            let version = bump_patch(model.version());
            candidate.set_version(&version);
            self.models.write().insert(name.to_string(), Arc::new(candidate));
            self.invalidate_explainers(name);
            self.retrains.fetch_add(1, Ordering::Relaxed);
            info!(model = %name, version = %version, "Retrain completed");
            version
        } else {
            warn!(model = %name, message = ?report.message, "Retrain failed");
            model.version().to_string()
        };

        Ok(RetrainReport {
            model_name: name.to_string(),
            training_results: report,
            new_version,
            training_samples: records.len(),
        })
    }

    pub fn model_info(&self, name: &str) -> Result<ModelSummary> {
        Ok(self.model(name)?.summary())
    }

    /// Summaries of every registered model, by name
    pub fn list_models(&self) -> Vec<ModelSummary> {
        let models = self.models.read();
        let mut summaries: Vec<ModelSummary> = models.values().map(|m| m.summary()).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Save `name` as `<models_dir>/<name>.bin`
    pub fn save_model(&self, name: &str) -> Result<PathBuf> {
        let path = self.config.models_dir.join(format!("{}.bin", name));
        self.save_model_to(name, &path)?;
        Ok(path)
    }

    pub fn save_model_to(&self, name: &str, path: &Path) -> Result<()> {
        self.model(name)?.save(path)
    }

    /// Drop explainers and, when configured, persist trained models.
    /// Returns the number of models saved.
    pub fn shutdown(&self) -> usize {
        let names = self.model_names();
        for name in &names {
            self.invalidate_explainers(name);
        }

        let mut saved = 0;
        if self.config.persist_on_shutdown {
            for name in &names {
                let trained = self.model(name).map(|m| m.is_trained()).unwrap_or(false);
                if !trained {
                    continue;
                }
                match self.save_model(name) {
                    Ok(_) => saved += 1,
                    Err(e) => warn!(model = %name, error = %e, "Failed to persist model on shutdown"),
                }
            }
        }
        info!(saved, "Prediction engine shut down");
        saved
    }

    pub fn stats(&self) -> EngineStats {
        let models = self.models.read();
        EngineStats {
            predictions: self.prediction_metrics.summary(),
            explanations: self.explanation_metrics.summary(),
            models_loaded: models.len(),
            trained_models: models.values().filter(|m| m.is_trained()).count(),
            retrains: self.retrains.load(Ordering::Relaxed),
        }
    }

    fn invalidate_explainers(&self, name: &str) {
        self.contribution.remove_explainer(name);
        self.perturbation.remove_explainer(name);
    }
}

enum Detail {
    Contribution(ContributionExplanation),
    Perturbation(PerturbationExplanation),
}

fn explain_by_contribution(
    explainer: &ContributionExplainer,
    name: &str,
    model: Arc<Model>,
    instance: &Array1<f64>,
    budget: &ExplainBudget,
) -> std::result::Result<ContributionExplanation, ExplainError> {
    let names = model.feature_names().to_vec();
    if explainer.is_available() && !explainer.has_explainer(name) {
        explainer.create(name, model, None);
    }
    explainer.explain_with_budget(name, instance, Some(&names), budget)
}

fn explain_by_perturbation(
    explainer: &PerturbationExplainer,
    name: &str,
    model: Arc<Model>,
    instance: &Array1<f64>,
    num_features: usize,
    num_samples: usize,
    budget: &ExplainBudget,
) -> std::result::Result<PerturbationExplanation, ExplainError> {
    if explainer.is_available() && !explainer.has_explainer(name) {
        if let Some(background) = model.background() {
            let class_names = match model.task() {
                TaskType::Classification => Some(model.classes().iter().map(|c| c.to_string()).collect()),
                TaskType::Regression => None,
            };
            explainer.create_explainer(background, model.feature_names(), class_names, name);
        }
    }
    let predict = prediction_fn(model);
    explainer.explain_prediction(name, instance, &*predict, num_features, num_samples, budget)
}

fn resolve_version(model: &Model, requested: Option<&str>) -> String {
    requested
        .map(str::to_string)
        .unwrap_or_else(|| model.version().to_string())
}

/// `1.2.3` -> `1.2.4`; tags without a numeric patch get `.1` appended
fn bump_patch(version: &str) -> String {
    match version.rsplit_once('.') {
        Some((head, patch)) => match patch.parse::<u64>() {
            Ok(n) => format!("{}.{}", head, n + 1),
            Err(_) => format!("{}.1", version),
        },
        None => format!("{}.1", version),
    }
}

/// One column per feature name seen in `vectors`, in first-seen order;
/// names a vector lacks read as 0
fn feature_frame(vectors: &[FeatureVector]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for vector in vectors {
        for name in vector.names() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .map(|name| {
            let values: Vec<f64> = vectors.iter().map(|v| v.get(name).unwrap_or(0.0)).collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}
