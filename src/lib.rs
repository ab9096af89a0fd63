//! Decision core - prediction serving for tabular decision models
//!
//! This crate provides:
//! - Deterministic feature extraction from loosely typed payloads
//! - Four model families behind one contract (decision tree, random
//!   forest, multilayer perceptron, quadratic discriminant analysis)
//! - Post-hoc attributions by contribution and by perturbation
//! - An orchestrator owning the model registry
//!
//! # Modules
//!
//! - [`features`] - Raw payload to feature vector extraction
//! - [`preprocessing`] - Fitted encoders and scalers
//! - [`training`] - Estimators, metrics and cross-validation
//! - [`models`] - Model contract, variants and artifacts
//! - [`explainability`] - Contribution and perturbation explainers
//! - [`inference`] - Prediction engine and its configuration
//! - [`monitoring`] - Serving latency and throughput
//! - [`cli`] - Command-line interface

pub mod error;

pub mod features;
pub mod preprocessing;
pub mod training;
pub mod models;

pub mod explainability;
pub mod inference;
pub mod monitoring;

pub mod cli;

pub use error::{DecisionError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{DecisionError, Result};
    pub use crate::explainability::{
        prediction_fn, ContributionExplainer, ExplainBudget, ExplainError, PerturbationExplainer,
    };
    pub use crate::features::{FeatureExtractor, FeatureMap, FeatureValue, FeatureVector, RawFeatures};
    pub use crate::inference::{EngineConfig, Explanation, PredictionEngine, PredictionResult};
    pub use crate::models::{Model, ModelKind, Prediction, PredictiveModel, TaskType};
}
