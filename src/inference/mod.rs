//! Prediction orchestration
//!
//! [`PredictionEngine`] owns the model registry and the explainers, and is
//! the only entry point the serving layer talks to.

mod config;
mod engine;

pub use config::{EngineConfig, ExplainerCapabilities, TrainingOptions};
pub use engine::{
    Attribution, EngineStats, Explanation, ExplanationMethod, HealthReport, HealthStatus,
    PredictionEngine, PredictionResult, RetrainReport,
};
