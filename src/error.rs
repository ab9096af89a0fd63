//! Error types for the decision core

use thiserror::Error;

/// Result type alias for decision-core operations
pub type Result<T> = std::result::Result<T, DecisionError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model not trained")]
    NotTrained,

    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    #[error("Explainer unavailable: {0}")]
    ExplainerUnavailable(String),

    #[error("Failed to load model artifact: {0}")]
    LoadError(String),

    #[error("Training failed: {0}")]
    TrainingFailure(String),

    #[error("Prediction failed for model {model}: {source}")]
    PredictionFailed {
        model: String,
        #[source]
        source: Box<DecisionError>,
    },

    #[error("Unknown explanation method: {0}")]
    UnknownMethod(String),

    #[error("Retrain already in progress for model {0}")]
    RetrainInProgress(String),

    #[error("Explanation timed out after {0} ms")]
    ExplanationTimedOut(u64),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecisionError {
    /// Wrap a failure raised while scoring an instance.
    ///
    /// Structural errors pass through untouched so callers can still match
    /// on `NotTrained` and `UnknownModel`.
    pub fn prediction_failed(model: &str, cause: DecisionError) -> Self {
        match cause {
            DecisionError::NotTrained
            | DecisionError::UnknownModel(_)
            | DecisionError::PredictionFailed { .. } => cause,
            other => DecisionError::PredictionFailed {
                model: model.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// True for errors that describe the request or registry rather than
    /// a numeric failure inside a model.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DecisionError::UnknownModel(_)
                | DecisionError::NotTrained
                | DecisionError::UnknownMethod(_)
                | DecisionError::RetrainInProgress(_)
        )
    }
}

impl From<polars::error::PolarsError> for DecisionError {
    fn from(err: polars::error::PolarsError) -> Self {
        DecisionError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DecisionError {
    fn from(err: serde_json::Error) -> Self {
        DecisionError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for DecisionError {
    fn from(err: bincode::Error) -> Self {
        DecisionError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DecisionError {
    fn from(err: ndarray::ShapeError) -> Self {
        DecisionError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
