//! Multilayer perceptron variant

use super::{ModelCore, ModelKind, ModelMetadata, PredictiveModel, TaskType};
use crate::error::{DecisionError, Result};
use crate::preprocessing::FeaturePipeline;
use crate::training::{Activation, MLPClassifier, MLPConfig, MLPRegressor, NetworkInfo};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Network hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MlpConfig {
    pub network: MLPConfig,
}

impl MlpConfig {
    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> Self {
        self.network = self.network.with_hidden_layers(layers);
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.network = self.network.with_activation(activation);
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.network = self.network.with_max_epochs(epochs);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.network = self.network.with_learning_rate(lr);
        self
    }

    pub fn with_early_stopping(mut self, enabled: bool) -> Self {
        self.network = self.network.with_early_stopping(enabled);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.network = self.network.with_random_state(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Network {
    Classifier(MLPClassifier),
    Regressor(MLPRegressor),
}

/// Perceptron over label-encoded, standard-scaled features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetworkModel {
    core: ModelCore,
    config: MlpConfig,
    network: Option<Network>,
}

impl NeuralNetworkModel {
    pub fn new(task: TaskType) -> Self {
        Self {
            core: ModelCore::new(
                ModelMetadata::new(
                    ModelKind::NeuralNetwork,
                    task,
                    "Multilayer perceptron for investment outcome prediction",
                ),
                FeaturePipeline::encoded_and_scaled(),
            ),
            config: MlpConfig::default(),
            network: None,
        }
    }

    pub fn with_config(mut self, config: MlpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Affine coefficients of a regressor without hidden layers, in scaled
    /// feature space
    pub fn linear_coefficients(&self) -> Option<(Array1<f64>, f64)> {
        match self.network.as_ref()? {
            Network::Regressor(m) => m.linear_coefficients(),
            Network::Classifier(_) => None,
        }
    }

    /// Layer sizes, parameter count and training history of the fitted net
    pub fn network_info(&self) -> Option<NetworkInfo> {
        match self.network.as_ref()? {
            Network::Classifier(m) => m.network_info(),
            Network::Regressor(m) => m.network_info(),
        }
    }
}

impl PredictiveModel for NeuralNetworkModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let config = self.config.network.clone();
        let network = match self.task() {
            TaskType::Classification => {
                let mut clf = MLPClassifier::new(config);
                clf.fit(x, y)?;
                Network::Classifier(clf)
            }
            TaskType::Regression => {
                let mut reg = MLPRegressor::new(config);
                reg.fit(x, y)?;
                Network::Regressor(reg)
            }
        };
        self.network = Some(network);
        Ok(())
    }

    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self.network.as_ref().ok_or(DecisionError::NotTrained)? {
            Network::Classifier(m) => m.predict_proba(x),
            Network::Regressor(m) => Ok(m.predict(x)?.insert_axis(Axis(1))),
        }
    }

    fn classes(&self) -> &[f64] {
        match &self.network {
            Some(Network::Classifier(m)) => m.classes(),
            _ => &[],
        }
    }

    fn estimator_importance(&self) -> Option<Array1<f64>> {
        match self.network.as_ref()? {
            Network::Classifier(m) => m.feature_importances(),
            Network::Regressor(m) => m.feature_importances(),
        }
    }

    fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "model_parameters": self.config.network,
            "network_info": self.network_info(),
        })
    }
}
