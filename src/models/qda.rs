//! Quadratic discriminant variant

use super::{ModelCore, ModelKind, ModelMetadata, PredictiveModel, TaskType};
use crate::error::{DecisionError, Result};
use crate::features::FeatureMap;
use crate::preprocessing::FeaturePipeline;
use crate::training::{ClassStatistics, QdaInfo, QuadraticDiscriminant};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdaConfig {
    pub reg_param: f64,
    pub tol: f64,
    pub priors: Option<Vec<f64>>,
}

impl Default for QdaConfig {
    fn default() -> Self {
        Self {
            reg_param: 0.0,
            tol: 1e-4,
            priors: None,
        }
    }
}

impl QdaConfig {
    pub fn with_reg_param(mut self, reg_param: f64) -> Self {
        self.reg_param = reg_param;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_priors(mut self, priors: Vec<f64>) -> Self {
        self.priors = Some(priors);
        self
    }

    fn build(&self) -> QuadraticDiscriminant {
        let qda = QuadraticDiscriminant::new()
            .with_reg_param(self.reg_param)
            .with_tol(self.tol);
        match &self.priors {
            Some(priors) => qda.with_priors(priors.clone()),
            None => qda,
        }
    }
}

/// QDA classifier over label-encoded, standard-scaled features.
///
/// Classification only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdaModel {
    core: ModelCore,
    config: QdaConfig,
    qda: Option<QuadraticDiscriminant>,
}

impl Default for QdaModel {
    fn default() -> Self {
        Self::new()
    }
}

impl QdaModel {
    pub fn new() -> Self {
        Self {
            core: ModelCore::new(
                ModelMetadata::new(
                    ModelKind::Qda,
                    TaskType::Classification,
                    "Quadratic discriminant analysis for investment outcome prediction",
                ),
                FeaturePipeline::encoded_and_scaled(),
            ),
            config: QdaConfig::default(),
            qda: None,
        }
    }

    pub fn with_config(mut self, config: QdaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &QdaConfig {
        &self.config
    }

    /// Per-class sample count, prior, mean and covariance log-determinant
    pub fn class_statistics(&self) -> Vec<ClassStatistics> {
        self.qda.as_ref().map(|q| q.class_statistics()).unwrap_or_default()
    }

    pub fn model_info(&self) -> Option<QdaInfo> {
        self.qda.as_ref().map(|q| q.model_info())
    }

    /// Per-class log posterior (up to a constant) for one instance
    pub fn decision_function(&self, features: &FeatureMap) -> Result<Array1<f64>> {
        let row = self.encode(features)?.insert_axis(Axis(0));
        let x = self.scale_rows(&row)?;
        let scores = self
            .qda
            .as_ref()
            .ok_or(DecisionError::NotTrained)?
            .decision_function(&x)?;
        Ok(scores.row(0).to_owned())
    }
}

impl PredictiveModel for QdaModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut qda = self.config.build();
        qda.fit(x, y)?;
        self.qda = Some(qda);
        Ok(())
    }

    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.qda.as_ref().ok_or(DecisionError::NotTrained)?.predict_proba(x)
    }

    fn classes(&self) -> &[f64] {
        self.qda.as_ref().map(|q| q.classes()).unwrap_or(&[])
    }

    fn estimator_importance(&self) -> Option<Array1<f64>> {
        self.qda.as_ref().and_then(|q| q.feature_importances())
    }

    fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "model_parameters": self.config,
            "model_info": self.model_info(),
            "class_statistics": self.class_statistics(),
        })
    }
}
