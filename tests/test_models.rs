//! Integration test: model variants train, predict, persist and report

use decision_core::features::{FeatureMap, FeatureValue};
use decision_core::models::{Model, ModelKind, Prediction, PredictiveModel, TaskType};
use decision_core::DecisionError;
use ndarray::Array1;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const N_ROWS: usize = 200;
const N_NOISE: usize = 13;

/// 200 rows, 14 features; `signal` alone separates the classes
fn separable_frame() -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let y: Vec<f64> = (0..N_ROWS).map(|i| (i % 2) as f64).collect();

    let signal: Vec<f64> = y
        .iter()
        .map(|&label| {
            let magnitude = rng.gen_range(2.0..4.0);
            if label > 0.5 { magnitude } else { -magnitude }
        })
        .collect();

    let mut columns: Vec<Column> = vec![Series::new("signal".into(), signal).into()];
    for j in 0..N_NOISE {
        let noise: Vec<f64> = (0..N_ROWS).map(|_| rng.gen_range(-1.0..1.0)).collect();
        columns.push(Series::new(format!("noise_{}", j).into(), noise).into());
    }

    (DataFrame::new(columns).unwrap(), Array1::from_vec(y))
}

fn regression_frame() -> (DataFrame, Array1<f64>) {
    let x1: Vec<f64> = (0..80).map(|i| i as f64 / 4.0).collect();
    let x2: Vec<f64> = (0..80).map(|i| ((i * 13) % 7) as f64).collect();
    let y: Array1<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a + 0.1 * b).collect();
    let df = df!("x1" => x1, "x2" => x2).unwrap();
    (df, y)
}

fn instance(signal: f64) -> FeatureMap {
    let mut features = FeatureMap::new();
    features.insert("signal".to_string(), FeatureValue::from(signal));
    for j in 0..N_NOISE {
        features.insert(format!("noise_{}", j), FeatureValue::from(0.0));
    }
    features
}

fn trained(kind: ModelKind) -> Model {
    let (df, y) = separable_frame();
    let mut model = Model::new(kind);
    let report = model.train(&df, &y, 0.2);
    assert!(report.is_success(), "{} failed: {:?}", kind, report.message);
    model
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_decision_tree_separates_clear_signal() {
    let (df, y) = separable_frame();
    let mut model = Model::new(ModelKind::DecisionTree);
    let report = model.train(&df, &y, 0.2);

    assert!(report.is_success(), "{:?}", report.message);
    assert_eq!(report.feature_count, 14);
    assert_eq!(report.training_samples + report.validation_samples, N_ROWS);
    let accuracy = report.metrics.get("accuracy").copied().unwrap();
    assert!(accuracy > 0.9, "validation accuracy {}", accuracy);

    let far_positive = instance(10.0);
    assert_eq!(model.predict(&far_positive).unwrap(), Prediction::Class(1));
    let confidence = model.predict_proba(&far_positive).unwrap().unwrap();
    assert!(confidence > 0.8, "confidence {}", confidence);
}

#[test]
fn test_every_family_learns_the_signal() {
    for kind in ModelKind::ALL {
        let model = trained(kind);
        assert!(model.is_trained());
        assert_eq!(model.feature_names().len(), 14);
        assert_eq!(model.predict(&instance(3.0)).unwrap(), Prediction::Class(1), "{}", kind);
        assert_eq!(model.predict(&instance(-3.0)).unwrap(), Prediction::Class(0), "{}", kind);

        let probabilities = model.class_probabilities(&instance(3.0)).unwrap().unwrap();
        let total: f64 = probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-6, "{} probabilities sum to {}", kind, total);
    }
}

#[test]
fn test_regression_tree_fits_linear_target() {
    let (df, y) = regression_frame();
    let mut model = Model::with_task(ModelKind::DecisionTree, TaskType::Regression);
    let report = model.train(&df, &y, 0.2);

    assert!(report.is_success(), "{:?}", report.message);
    assert!(report.metrics.get("r2").copied().unwrap() > 0.8);

    let mut features = FeatureMap::new();
    features.insert("x1".to_string(), FeatureValue::from(10.0));
    features.insert("x2".to_string(), FeatureValue::from(3.0));
    match model.predict(&features).unwrap() {
        Prediction::Value(v) => assert!((v - 30.3).abs() < 3.0, "predicted {}", v),
        other => panic!("expected a value, got {:?}", other),
    }
    assert_eq!(model.predict_proba(&features).unwrap(), None);
}

#[test]
fn test_qda_always_classifies() {
    let model = Model::with_task(ModelKind::Qda, TaskType::Regression);
    assert_eq!(model.task(), TaskType::Classification);
}

#[test]
fn test_mismatched_targets_fail_without_error() {
    let (df, _) = separable_frame();
    let mut model = Model::new(ModelKind::RandomForest);
    let report = model.train(&df, &Array1::zeros(5), 0.2);

    assert!(!report.is_success());
    assert!(!model.is_trained());
}

// ============================================================================
// Untrained behaviour
// ============================================================================

#[test]
fn test_untrained_models_report_not_trained() {
    for kind in ModelKind::ALL {
        let model = Model::new(kind);
        assert!(!model.is_trained());
        assert!(matches!(model.predict(&instance(1.0)), Err(DecisionError::NotTrained)));
        assert!(matches!(model.predict_proba(&instance(1.0)), Err(DecisionError::NotTrained)));
        assert!(matches!(model.encode(&instance(1.0)), Err(DecisionError::NotTrained)));

        let batch = model.predict_batch(&[instance(1.0), instance(-1.0)]);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|r| matches!(r, Err(DecisionError::NotTrained))));
    }
}

// ============================================================================
// Batch prediction
// ============================================================================

#[test]
fn test_batch_preserves_order_and_length() {
    let model = trained(ModelKind::RandomForest);
    let batch = vec![instance(3.0), instance(-3.0), instance(2.5), instance(-2.5)];

    let predictions = model.predict_batch(&batch);
    assert_eq!(predictions.len(), 4);
    let labels: Vec<Prediction> = predictions.into_iter().map(|p| p.unwrap()).collect();
    assert_eq!(
        labels,
        vec![Prediction::Class(1), Prediction::Class(0), Prediction::Class(1), Prediction::Class(0)]
    );

    assert!(model.predict_batch(&[]).is_empty());
    assert!(model.predict_proba_batch(&[]).is_empty());
}

// ============================================================================
// Importance
// ============================================================================

#[test]
fn test_importance_is_normalised_for_every_family() {
    for kind in ModelKind::ALL {
        let model = trained(kind);
        let importance = model.get_feature_importance();

        assert_eq!(importance.len(), 14, "{}", kind);
        assert!(importance.values().all(|v| *v >= 0.0), "{}", kind);
        let total: f64 = importance.values().sum();
        assert!((total - 1.0).abs() < 1e-6, "{} importance sums to {}", kind, total);
    }
}

#[test]
fn test_importance_ranks_signal_first() {
    for kind in [ModelKind::DecisionTree, ModelKind::RandomForest, ModelKind::Qda] {
        let ranked = trained(kind).ranked_feature_importance();
        assert_eq!(ranked[0].0, "signal", "{}", kind);
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_load_reproduces_predictions() {
    let dir = tempfile::tempdir().unwrap();

    for kind in ModelKind::ALL {
        let model = trained(kind);
        let path = dir.path().join(format!("{}.bin", kind));
        model.save(&path).unwrap();

        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded.kind(), kind);
        assert_eq!(loaded.version(), model.version());
        assert_eq!(loaded.feature_names(), model.feature_names());
        for signal in [-3.0, -0.5, 0.5, 3.0] {
            assert_eq!(
                loaded.predict(&instance(signal)).unwrap(),
                model.predict(&instance(signal)).unwrap()
            );
            assert_eq!(
                loaded.predict_proba(&instance(signal)).unwrap(),
                model.predict_proba(&instance(signal)).unwrap()
            );
        }
    }
}

#[test]
fn test_load_missing_artifact_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = Model::new(ModelKind::DecisionTree);
    let result = model.load_into(&dir.path().join("absent.bin"));

    assert!(result.is_err());
    assert!(!model.is_trained());
}

// ============================================================================
// Summary
// ============================================================================

#[test]
fn test_summary_serialises_family_as_type() {
    let model = trained(ModelKind::Qda);
    let summary = model.summary();

    assert_eq!(summary.feature_count, 14);
    assert!(summary.is_trained);
    assert!(summary.training_date.is_some());

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["type"], "qda");
    assert_eq!(json["version"], "1.0.0");
}
