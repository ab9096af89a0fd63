//! Integration test: prediction engine end-to-end

use decision_core::features::RawFeatures;
use decision_core::inference::{
    EngineConfig, ExplainerCapabilities, ExplanationMethod, HealthStatus, PredictionEngine,
};
use decision_core::models::{Prediction, PredictiveModel};
use decision_core::DecisionError;
use serde_json::json;

const MODEL: &str = "decision_tree";

fn company(revenue: f64, customers: u64) -> RawFeatures {
    json!({
        "revenue": revenue,
        "customer_count": customers,
        "funding_stage": "Seed",
        "sector": "SaaS",
        "founded_date": "2018-06-01",
        "geography": "Berlin, Germany",
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// 60 companies; the label is whether revenue is above a million
fn training_set() -> (Vec<RawFeatures>, Vec<f64>) {
    let mut records = Vec::new();
    let mut targets = Vec::new();
    for i in 0..60u64 {
        let label = i % 2;
        let revenue = if label == 1 {
            1_500_000.0 + (i * 25_000) as f64
        } else {
            40_000.0 + (i * 5_000) as f64
        };
        records.push(company(revenue, (i * 7) % 40));
        targets.push(label as f64);
    }
    (records, targets)
}

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_models_dir(std::env::temp_dir().join("decision-core-unused"))
        .with_perturbation(300, 5)
        .with_persist_on_shutdown(false)
        .with_explainers(ExplainerCapabilities::all())
        .with_explain_timeout_ms(30_000)
}

async fn trained_engine(config: EngineConfig) -> PredictionEngine {
    let engine = PredictionEngine::new(config);
    let (records, targets) = training_set();
    let report = engine.retrain(MODEL, &records, &targets).await.unwrap();
    assert!(report.training_results.is_success(), "{:?}", report.training_results.message);
    engine
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn test_engine_registers_every_family() {
    let engine = PredictionEngine::new(config());
    assert_eq!(engine.model_names(), vec!["decision_tree", "neural_network", "qda", "random_forest"]);
    assert!(engine.list_models().iter().all(|m| !m.is_trained));
    assert!(matches!(engine.model_info("gbm"), Err(DecisionError::UnknownModel(_))));
}

// ============================================================================
// Retrain
// ============================================================================

#[tokio::test]
async fn test_retrain_swaps_model_and_bumps_version() {
    let engine = PredictionEngine::new(config());
    let (records, targets) = training_set();

    let report = engine.retrain(MODEL, &records, &targets).await.unwrap();
    assert!(report.training_results.is_success());
    assert_eq!(report.new_version, "1.0.1");
    assert_eq!(report.training_samples, 60);

    let model = engine.model(MODEL).unwrap();
    assert!(model.is_trained());
    assert_eq!(model.version(), "1.0.1");
    assert_eq!(engine.stats().retrains, 1);
    assert_eq!(engine.stats().trained_models, 1);
}

#[tokio::test]
async fn test_retrain_rejects_mismatched_targets() {
    let engine = PredictionEngine::new(config());
    let (records, _) = training_set();

    let result = engine.retrain(MODEL, &records, &[1.0, 0.0]).await;
    assert!(matches!(result, Err(DecisionError::ValidationError(_))));
    assert!(!engine.model(MODEL).unwrap().is_trained());

    let result = engine.retrain("gbm", &records, &[]).await;
    assert!(matches!(result, Err(DecisionError::UnknownModel(_))));
}

#[tokio::test]
async fn test_failed_retrain_keeps_registered_model() {
    let engine = trained_engine(config()).await;
    let records = vec![company(1.0, 1), company(2.0, 2)];

    let report = engine.retrain(MODEL, &records, &[0.0, 1.0]).await.unwrap();
    assert!(!report.training_results.is_success());
    assert_eq!(report.new_version, "1.0.1");
    assert_eq!(engine.model(MODEL).unwrap().version(), "1.0.1");
}

#[tokio::test]
async fn test_concurrent_retrain_of_one_model() {
    let engine = PredictionEngine::new(config());
    let (records, targets) = training_set();

    let (first, second) = tokio::join!(
        engine.retrain(MODEL, &records, &targets),
        engine.retrain(MODEL, &records, &targets),
    );

    let outcomes = [first, second];
    assert!(outcomes.iter().any(|r| r.is_ok()));
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(matches!(e, DecisionError::RetrainInProgress(_)), "unexpected {}", e);
        }
    }
}

// ============================================================================
// Prediction
// ============================================================================

#[tokio::test]
async fn test_predict_after_retrain() {
    let engine = trained_engine(config()).await;

    let result = engine.predict(MODEL, &company(3_000_000.0, 12), None).await.unwrap();
    assert_eq!(result.prediction, Prediction::Class(1));
    assert!(result.confidence.unwrap() > 0.8);
    assert_eq!(result.model_name, MODEL);
    assert_eq!(result.model_version, "1.0.1");
    assert_eq!(result.features.get("revenue"), Some(3_000_000.0));

    let result = engine.predict(MODEL, &company(10_000.0, 3), Some("2.0.0")).await.unwrap();
    assert_eq!(result.prediction, Prediction::Class(0));
    assert_eq!(result.model_version, "2.0.0");
}

#[tokio::test]
async fn test_predict_errors() {
    let engine = trained_engine(config()).await;
    let raw = company(1.0, 1);

    assert!(matches!(engine.predict("gbm", &raw, None).await, Err(DecisionError::UnknownModel(_))));
    assert!(matches!(engine.predict("qda", &raw, None).await, Err(DecisionError::NotTrained)));
}

#[tokio::test]
async fn test_batch_keeps_order_across_chunks() {
    let engine = trained_engine(config().with_batch_chunk(2)).await;
    let batch = vec![
        company(2_000_000.0, 5),
        company(20_000.0, 5),
        company(2_500_000.0, 9),
        company(30_000.0, 1),
        company(4_000_000.0, 2),
    ];

    let results = engine.predict_batch(MODEL, &batch, None).await.unwrap();
    let labels: Vec<Prediction> = results.into_iter().map(|r| r.unwrap().prediction).collect();
    assert_eq!(
        labels,
        vec![
            Prediction::Class(1),
            Prediction::Class(0),
            Prediction::Class(1),
            Prediction::Class(0),
            Prediction::Class(1),
        ]
    );

    assert!(engine.predict_batch(MODEL, &[], None).await.unwrap().is_empty());
    assert!(matches!(
        engine.predict_batch("gbm", &batch, None).await,
        Err(DecisionError::UnknownModel(_))
    ));

    let untrained = engine.predict_batch("qda", &batch, None).await.unwrap();
    assert_eq!(untrained.len(), batch.len());
    assert!(untrained.iter().all(|r| matches!(r, Err(DecisionError::NotTrained))));
}

// ============================================================================
// Explanation
// ============================================================================

#[tokio::test]
async fn test_explain_by_contribution() {
    let engine = trained_engine(config()).await;
    let explanation = engine.explain(MODEL, &company(3_000_000.0, 12), "shap").await.unwrap();

    assert_eq!(explanation.method, ExplanationMethod::Contribution);
    assert_eq!(explanation.model_version, "1.0.1");
    assert_eq!(explanation.contributions[0].feature, "revenue");
    assert!(explanation.contributions[0].contribution > 0.0);
    assert!(explanation.baseline.is_some());
    assert!(engine.contribution_explainer().has_explainer(MODEL));

    let n = engine.model(MODEL).unwrap().feature_names().len();
    assert_eq!(explanation.contributions.len(), n);
}

#[tokio::test]
async fn test_explain_by_perturbation() {
    let engine = trained_engine(config()).await;
    let explanation = engine.explain(MODEL, &company(3_000_000.0, 12), "lime").await.unwrap();

    assert_eq!(explanation.method, ExplanationMethod::Perturbation);
    assert!(!explanation.contributions.is_empty());
    assert!(explanation.contributions.len() <= 5);
    assert_eq!(explanation.contributions[0].feature, "revenue");
    assert!(explanation.perturbation_detail.is_some());
}

#[tokio::test]
async fn test_explain_errors() {
    let engine = trained_engine(config()).await;
    let raw = company(3_000_000.0, 12);

    assert!(matches!(engine.explain(MODEL, &raw, "anchors").await, Err(DecisionError::UnknownMethod(_))));
    assert!(matches!(engine.explain("gbm", &raw, "shap").await, Err(DecisionError::UnknownModel(_))));
    assert!(matches!(engine.explain("qda", &raw, "shap").await, Err(DecisionError::NotTrained)));
}

#[tokio::test]
async fn test_disabled_explainers() {
    let engine = trained_engine(config().with_explainers(ExplainerCapabilities::none())).await;
    let result = engine.explain(MODEL, &company(3_000_000.0, 12), "contribution").await;
    assert!(matches!(result, Err(DecisionError::ExplainerUnavailable(_))));

    let health = engine.health_check().await;
    assert!(!health.contribution_explainer);
    assert!(!health.perturbation_explainer);
}

#[tokio::test]
async fn test_explanation_times_out() {
    let engine = trained_engine(config().with_explain_timeout_ms(0)).await;
    let result = engine.explain(MODEL, &company(3_000_000.0, 12), "perturbation").await;
    assert!(matches!(result, Err(DecisionError::ExplanationTimedOut(_))));
}

#[tokio::test]
async fn test_retrain_invalidates_explainers() {
    let engine = trained_engine(config()).await;
    engine.explain(MODEL, &company(3_000_000.0, 12), "shap").await.unwrap();
    assert!(engine.contribution_explainer().has_explainer(MODEL));

    let (records, targets) = training_set();
    engine.retrain(MODEL, &records, &targets).await.unwrap();
    assert!(!engine.contribution_explainer().has_explainer(MODEL));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_of_fresh_engine() {
    let engine = PredictionEngine::new(config());
    let health = engine.health_check().await;

    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.models_loaded, 4);
    assert_eq!(health.healthy_models, 0);
}

#[tokio::test]
async fn test_health_with_every_model_trained() {
    let engine = PredictionEngine::new(config());
    let (records, targets) = training_set();
    for name in engine.model_names() {
        let report = engine.retrain(&name, &records, &targets).await.unwrap();
        assert!(report.training_results.is_success(), "{}: {:?}", name, report.training_results.message);
    }

    let health = engine.health_check().await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.is_healthy());
    assert_eq!(health.models_loaded, 4);
    assert_eq!(health.healthy_models, 4);
    assert_eq!(health.model_status.len(), 4);
    assert!(health.model_status.values().all(|s| s == "healthy"), "{:?}", health.model_status);
}

#[tokio::test]
async fn test_health_reports_each_model() {
    let engine = trained_engine(config()).await;
    let health = engine.health_check().await;

    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(!health.is_healthy());
    assert_eq!(health.healthy_models, 1);
    assert_eq!(health.model_status[MODEL], "healthy");
    assert_eq!(health.model_status["qda"], "unhealthy: Model not trained");

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["status"], "degraded");
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_saved_models_reload_into_new_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = trained_engine(config().with_models_dir(dir.path())).await;
    let path = engine.save_model(MODEL).unwrap();
    assert!(path.exists());
    std::fs::write(dir.path().join("broken.bin"), b"not an artifact").unwrap();

    let reloaded = PredictionEngine::new(config().with_models_dir(dir.path()));
    assert_eq!(reloaded.load_models_from_dir().unwrap(), 1);

    let raw = company(3_000_000.0, 12);
    let before = engine.predict(MODEL, &raw, None).await.unwrap();
    let after = reloaded.predict(MODEL, &raw, None).await.unwrap();
    assert_eq!(before.prediction, after.prediction);
    assert_eq!(before.confidence, after.confidence);
    assert_eq!(after.model_version, "1.0.1");
}

#[tokio::test]
async fn test_shutdown_persists_trained_models() {
    let dir = tempfile::tempdir().unwrap();
    let engine = trained_engine(config().with_models_dir(dir.path()).with_persist_on_shutdown(true)).await;

    assert_eq!(engine.shutdown(), 1);
    assert!(dir.path().join("decision_tree.bin").exists());
    assert!(!dir.path().join("qda.bin").exists());
}

#[tokio::test]
async fn test_missing_models_dir_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = PredictionEngine::new(config().with_models_dir(dir.path().join("absent")));
    assert_eq!(engine.load_models_from_dir().unwrap(), 0);
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn test_stats_count_requests_and_errors() {
    let engine = trained_engine(config()).await;
    let raw = company(3_000_000.0, 12);

    engine.predict(MODEL, &raw, None).await.unwrap();
    engine.predict(MODEL, &raw, None).await.unwrap();
    let _ = engine.predict("qda", &raw, None).await;

    let stats = engine.stats();
    assert_eq!(stats.predictions.total_requests, 3);
    assert_eq!(stats.predictions.total_errors, 1);
    assert_eq!(stats.models_loaded, 4);
}
