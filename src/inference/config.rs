//! Engine configuration

use crate::models::TaskType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Explanation backends switched on at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainerCapabilities {
    pub contribution: bool,
    pub perturbation: bool,
}

impl Default for ExplainerCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl ExplainerCapabilities {
    pub fn all() -> Self {
        Self {
            contribution: true,
            perturbation: true,
        }
    }

    pub fn none() -> Self {
        Self {
            contribution: false,
            perturbation: false,
        }
    }

    /// Parse a comma separated backend list. `shap` and `lime` are accepted
    /// as aliases; unknown entries are ignored.
    pub fn parse(list: &str) -> Self {
        let mut caps = Self::none();
        for entry in list.split(',').map(|e| e.trim().to_lowercase()) {
            match entry.as_str() {
                "contribution" | "shap" => caps.contribution = true,
                "perturbation" | "lime" => caps.perturbation = true,
                _ => {}
            }
        }
        caps
    }
}

/// Configuration for the prediction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory scanned for model artifacts
    pub models_dir: PathBuf,

    /// Items handed to a model per batch call
    pub batch_chunk: usize,

    /// Upper bound on a single explanation
    pub explain_timeout_ms: u64,

    pub explainers: ExplainerCapabilities,

    /// Save every trained model into `models_dir` on shutdown
    pub persist_on_shutdown: bool,

    /// Neighbours drawn per perturbation explanation
    pub perturbation_samples: usize,

    /// Features kept in a perturbation surrogate
    pub perturbation_features: usize,

    pub training: TrainingOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: std::env::var("DECISION_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            batch_chunk: std::env::var("DECISION_BATCH_CHUNK")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(100),
            explain_timeout_ms: std::env::var("DECISION_EXPLAIN_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30_000),
            explainers: std::env::var("DECISION_EXPLAINERS")
                .map(|s| ExplainerCapabilities::parse(&s))
                .unwrap_or_default(),
            persist_on_shutdown: std::env::var("DECISION_PERSIST_ON_SHUTDOWN")
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            perturbation_samples: 1000,
            perturbation_features: 10,
            training: TrainingOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_batch_chunk(mut self, size: usize) -> Self {
        self.batch_chunk = size.max(1);
        self
    }

    pub fn with_explain_timeout_ms(mut self, ms: u64) -> Self {
        self.explain_timeout_ms = ms;
        self
    }

    pub fn with_explainers(mut self, explainers: ExplainerCapabilities) -> Self {
        self.explainers = explainers;
        self
    }

    pub fn with_persist_on_shutdown(mut self, persist: bool) -> Self {
        self.persist_on_shutdown = persist;
        self
    }

    pub fn with_perturbation(mut self, num_samples: usize, num_features: usize) -> Self {
        self.perturbation_samples = num_samples;
        self.perturbation_features = num_features;
        self
    }

    pub fn with_training(mut self, training: TrainingOptions) -> Self {
        self.training = training;
        self
    }

    pub fn explain_timeout(&self) -> Duration {
        Duration::from_millis(self.explain_timeout_ms)
    }
}

/// Options for retraining through the engine or the CLI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Held-out share of the rows
    pub validation_split: f64,
    pub task: TaskType,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            validation_split: 0.2,
            task: TaskType::Classification,
        }
    }
}

impl TrainingOptions {
    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_task(mut self, task: TaskType) -> Self {
        self.task = task;
        self
    }
}
