//! Single decision tree variant

use super::{ModelCore, ModelKind, ModelMetadata, PredictiveModel, TaskType};
use crate::error::{DecisionError, Result};
use crate::preprocessing::FeaturePipeline;
use crate::training::{Criterion, DecisionTree};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Tree hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Impurity criterion for classifiers; regressors always use MSE
    pub criterion: Criterion,
    pub random_state: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
            criterion: Criterion::Gini,
            random_state: 42,
        }
    }
}

impl TreeConfig {
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    fn build(&self, task: TaskType) -> DecisionTree {
        let tree = match task {
            TaskType::Classification => DecisionTree::new_classifier().with_criterion(self.criterion),
            TaskType::Regression => DecisionTree::new_regressor(),
        };
        let tree = tree
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_random_state(self.random_state);
        match self.max_depth {
            Some(depth) => tree.with_max_depth(depth),
            None => tree,
        }
    }
}

/// Shape of a fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeInfo {
    pub depth: usize,
    pub n_leaves: usize,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Decision tree over label-encoded, standard-scaled features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    core: ModelCore,
    config: TreeConfig,
    tree: Option<DecisionTree>,
}

impl DecisionTreeModel {
    pub fn new(task: TaskType) -> Self {
        Self {
            core: ModelCore::new(
                ModelMetadata::new(
                    ModelKind::DecisionTree,
                    task,
                    "Decision tree for investment outcome prediction",
                ),
                FeaturePipeline::encoded_and_scaled(),
            ),
            config: TreeConfig::default(),
            tree: None,
        }
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn tree(&self) -> Option<&DecisionTree> {
        self.tree.as_ref()
    }

    pub fn tree_info(&self) -> Option<TreeInfo> {
        self.tree.as_ref().map(|t| TreeInfo {
            depth: t.get_depth(),
            n_leaves: t.get_n_leaves(),
            n_features: t.n_features(),
            n_classes: t.classes().len(),
        })
    }
}

impl PredictiveModel for DecisionTreeModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut tree = self.config.build(self.task());
        tree.fit(x, y)?;
        self.tree = Some(tree);
        Ok(())
    }

    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let tree = self.tree.as_ref().ok_or(DecisionError::NotTrained)?;
        if tree.is_classification() {
            tree.predict_proba(x)
        } else {
            Ok(tree.predict(x)?.insert_axis(ndarray::Axis(1)))
        }
    }

    fn classes(&self) -> &[f64] {
        self.tree.as_ref().map(|t| t.classes()).unwrap_or(&[])
    }

    fn estimator_importance(&self) -> Option<Array1<f64>> {
        self.tree.as_ref().and_then(|t| t.feature_importances().cloned())
    }

    fn trees(&self) -> Vec<&DecisionTree> {
        self.tree.iter().collect()
    }

    fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "model_parameters": self.config,
            "tree_info": self.tree_info(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureMap, FeatureValue};
    use polars::prelude::*;

    #[test]
    fn test_default_parameters() {
        let config = TreeConfig::default();
        assert_eq!(config.max_depth, Some(10));
        assert_eq!(config.min_samples_split, 5);
        assert_eq!(config.min_samples_leaf, 2);
    }

    #[test]
    fn test_categorical_column_is_encoded() {
        let stages: Vec<&str> = (0..12).map(|i| if i % 2 == 0 { "Seed" } else { "Series C" }).collect();
        let y: Array1<f64> = (0..stages.len()).map(|i| (i % 2) as f64).collect();
        let df = DataFrame::new(vec![
            Series::new("funding_stage".into(), stages.as_slice()).into(),
            Series::new("revenue".into(), &[1.0; 12]).into(),
        ])
        .unwrap();

        let mut model = DecisionTreeModel::new(TaskType::Classification)
            .with_config(TreeConfig::default().with_min_samples_split(2).with_min_samples_leaf(1));
        assert!(model.train(&df, &y, 0.25).is_success());

        let mut features = FeatureMap::new();
        features.insert("funding_stage".to_string(), FeatureValue::from("Series C"));
        features.insert("revenue".to_string(), FeatureValue::from(1.0));
        assert_eq!(model.predict(&features).unwrap(), super::super::Prediction::Class(1));
        assert!(model.tree_info().unwrap().n_leaves >= 2);
    }

    #[test]
    fn test_regressor_has_no_confidence() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Array1<f64> = x.iter().map(|v| v * 2.0).collect();
        let df = DataFrame::new(vec![Series::new("x".into(), x).into()]).unwrap();

        let mut model = DecisionTreeModel::new(TaskType::Regression);
        assert!(model.train(&df, &y, 0.2).is_success());

        let mut features = FeatureMap::new();
        features.insert("x".to_string(), FeatureValue::from(10.0));
        assert_eq!(model.predict_proba(&features).unwrap(), None);
        assert!(model.metadata().performance_metrics.contains_key("r2"));
    }
}
