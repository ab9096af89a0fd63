//! Random forest variant

use super::{to_prediction, ModelCore, ModelKind, ModelMetadata, Prediction, PredictiveModel, TaskType};
use crate::error::{DecisionError, Result};
use crate::features::FeatureMap;
use crate::preprocessing::FeaturePipeline;
use crate::training::{DecisionTree, MaxFeatures, RandomForest};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    /// k-fold CV run during training; below 2 disables it
    pub cv_folds: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 42,
            cv_folds: 5,
        }
    }
}

impl ForestConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

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

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn build(&self, task: TaskType) -> RandomForest {
        let forest = match task {
            TaskType::Classification => RandomForest::new_classifier(self.n_estimators),
            TaskType::Regression => RandomForest::new_regressor(self.n_estimators),
        };
        let forest = forest
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_random_state(self.random_state);
        match self.max_depth {
            Some(depth) => forest.with_max_depth(depth),
            None => forest,
        }
    }
}

/// Shape of a fitted forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestInfo {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Bagged trees over numeric columns; text columns are coerced, not encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    core: ModelCore,
    config: ForestConfig,
    forest: Option<RandomForest>,
}

impl RandomForestModel {
    pub fn new(task: TaskType) -> Self {
        Self {
            core: ModelCore::new(
                ModelMetadata::new(
                    ModelKind::RandomForest,
                    task,
                    "Random Forest model for startup success prediction",
                ),
                FeaturePipeline::numeric_passthrough(),
            ),
            config: ForestConfig::default(),
            forest: None,
        }
    }

    pub fn with_config(mut self, config: ForestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn forest(&self) -> Option<&RandomForest> {
        self.forest.as_ref()
    }

    pub fn forest_info(&self) -> Option<ForestInfo> {
        self.forest.as_ref().map(|f| ForestInfo {
            n_estimators: f.n_trees(),
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            n_features: f.n_features(),
            n_classes: f.classes().len(),
        })
    }
}

impl PredictiveModel for RandomForestModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn fit_estimator(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut forest = self.config.build(self.task());
        forest.fit(x, y)?;
        self.forest = Some(forest);
        Ok(())
    }

    fn estimator_output(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.forest
            .as_ref()
            .ok_or(DecisionError::NotTrained)?
            .predict_output(x)
    }

    fn classes(&self) -> &[f64] {
        self.forest.as_ref().map(|f| f.classes()).unwrap_or(&[])
    }

    fn estimator_importance(&self) -> Option<Array1<f64>> {
        self.forest.as_ref().and_then(|f| f.feature_importances().cloned())
    }

    fn cv_folds(&self) -> usize {
        self.config.cv_folds
    }

    fn trees(&self) -> Vec<&DecisionTree> {
        self.forest.iter().flat_map(|f| f.trees()).collect()
    }

    fn details(&self) -> serde_json::Value {
        let top: Vec<serde_json::Value> = self
            .ranked_feature_importance()
            .into_iter()
            .map(|(feature, importance)| serde_json::json!({ "feature": feature, "importance": importance }))
            .collect();
        serde_json::json!({
            "model_parameters": self.config,
            "tree_info": self.forest_info(),
            "feature_importance": top,
        })
    }

    /// Encode every instance, score them in one pass and fall back to
    /// per-item scoring if the joint pass fails.
    fn predict_batch(&self, batch: &[FeatureMap]) -> Vec<Result<Prediction>> {
        if batch.is_empty() {
            return Vec::new();
        }
        if !self.is_trained() {
            return batch.iter().map(|_| Err(DecisionError::NotTrained)).collect();
        }

        let names = self.feature_names();
        let rows: Vec<Array1<f64>> = batch
            .par_iter()
            .map(|features| self.core.pipeline.encode_row(features, names))
            .collect();
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();

        let scored = ndarray::stack(Axis(0), &views)
            .map_err(DecisionError::from)
            .and_then(|x| self.score_rows(&x));

        match scored {
            Ok(output) => output
                .rows()
                .into_iter()
                .map(|row| Ok(to_prediction(self, &row.to_vec())))
                .collect(),
            Err(e) => {
                debug!(model = %self.name(), error = %e, "Vectorised batch failed, scoring items one by one");
                batch.iter().map(|features| self.predict(features)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use polars::prelude::*;

    fn training_frame(n: usize) -> (DataFrame, Array1<f64>) {
        let funding: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 + (i % 4) as f64 } else { 9.0 + (i % 3) as f64 }).collect();
        let employees: Vec<f64> = (0..n).map(|i| (i % 13) as f64).collect();
        let y: Array1<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let df = DataFrame::new(vec![
            Series::new("funding_amount".into(), funding).into(),
            Series::new("employee_count".into(), employees).into(),
        ])
        .unwrap();
        (df, y)
    }

    fn small_forest() -> RandomForestModel {
        RandomForestModel::new(TaskType::Classification)
            .with_config(ForestConfig::default().with_n_estimators(15).with_cv_folds(3))
    }

    fn instance(funding: f64) -> FeatureMap {
        let mut features = FeatureMap::new();
        features.insert("funding_amount".to_string(), FeatureValue::from(funding));
        features.insert("employee_count".to_string(), FeatureValue::from(4.0));
        features
    }

    #[test]
    fn test_training_runs_cross_validation() {
        let (df, y) = training_frame(80);
        let mut model = small_forest();
        let report = model.train(&df, &y, 0.2);

        assert!(report.is_success(), "{:?}", report.message);
        assert_eq!(report.cv_scores.len(), 3);
        assert!(model.metadata().performance_metrics.contains_key("cv_mean"));
        assert_eq!(model.trees().len(), 15);
    }

    #[test]
    fn test_vectorised_batch_matches_single_predictions() {
        let (df, y) = training_frame(80);
        let mut model = small_forest();
        assert!(model.train(&df, &y, 0.2).is_success());

        let batch: Vec<FeatureMap> = [2.0, 10.0, 3.0, 11.0].iter().map(|f| instance(*f)).collect();
        let batched = model.predict_batch(&batch);
        assert_eq!(batched.len(), batch.len());
        for (features, result) in batch.iter().zip(batched) {
            assert_eq!(result.unwrap(), model.predict(features).unwrap());
        }
        assert!(model.predict_batch(&[]).is_empty());
    }

    #[test]
    fn test_importance_is_normalised() {
        let (df, y) = training_frame(80);
        let mut model = small_forest();
        assert!(model.train(&df, &y, 0.2).is_success());

        let importance = model.get_feature_importance();
        assert_eq!(importance.len(), 2);
        let total: f64 = importance.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(model.ranked_feature_importance()[0].0, "funding_amount");
    }

    #[test]
    fn test_untrained_batch_reports_every_slot() {
        let model = small_forest();
        let results = model.predict_batch(&[instance(1.0), instance(2.0)]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(DecisionError::NotTrained))));
    }
}
