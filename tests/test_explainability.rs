//! Integration test: contribution and perturbation explainers

use decision_core::explainability::{
    prediction_fn, ContributionExplainer, ContributionStrategy, ExplainBudget, ExplainError,
    PerturbationExplainer,
};
use decision_core::features::{FeatureMap, FeatureValue};
use decision_core::models::{Model, ModelKind, PredictiveModel};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use std::sync::Arc;

fn frame() -> (DataFrame, Array1<f64>) {
    let n = 120;
    let signal: Vec<f64> = (0..n)
        .map(|i| if i % 2 == 0 { -1.0 - (i % 9) as f64 * 0.3 } else { 1.0 + (i % 7) as f64 * 0.4 })
        .collect();
    let aux: Vec<f64> = (0..n).map(|i| ((i * 17) % 13) as f64 / 13.0).collect();
    let level: Vec<f64> = (0..n).map(|i| ((i * 5) % 11) as f64).collect();
    let y: Array1<f64> = (0..n).map(|i| (i % 2) as f64).collect();

    let df = df!("signal" => signal, "aux" => aux, "level" => level).unwrap();
    (df, y)
}

fn trained(kind: ModelKind) -> Arc<Model> {
    let (df, y) = frame();
    let mut model = Model::new(kind).named("subject");
    let report = model.train(&df, &y, 0.2);
    assert!(report.is_success(), "{} failed: {:?}", kind, report.message);
    Arc::new(model)
}

fn instance(model: &Model, signal: f64) -> Array1<f64> {
    let mut features = FeatureMap::new();
    features.insert("signal".to_string(), FeatureValue::from(signal));
    features.insert("aux".to_string(), FeatureValue::from(0.4));
    features.insert("level".to_string(), FeatureValue::from(5.0));
    model.encode(&features).unwrap()
}

/// Output column the explainers attribute
fn raw_score(model: &Model, row: &Array1<f64>) -> f64 {
    let scores = model.score_rows(&row.clone().insert_axis(Axis(0))).unwrap();
    scores[[0, model.explained_output()]]
}

// ============================================================================
// Contribution
// ============================================================================

#[test]
fn test_forest_contributions_add_up_to_score() {
    let model = trained(ModelKind::RandomForest);
    let explainer = ContributionExplainer::new(true);
    assert!(explainer.create("subject", Arc::clone(&model), None));

    let x = instance(&model, 2.2);
    let names = model.feature_names().to_vec();
    let explanation = explainer.explain("subject", &x, Some(&names)).unwrap();

    assert_eq!(explanation.strategy, ContributionStrategy::Tree);
    assert_eq!(explanation.values.len(), 3);
    let total = explanation.expected_value + explanation.values.iter().sum::<f64>();
    assert!((total - raw_score(&model, &x)).abs() < 1e-6, "{} vs {}", total, raw_score(&model, &x));
    assert_eq!(explanation.ranked_features.unwrap()[0], "signal");
}

#[test]
fn test_every_family_is_additive() {
    for kind in ModelKind::ALL {
        let model = trained(kind);
        let explainer = ContributionExplainer::new(true);
        assert!(explainer.create("subject", Arc::clone(&model), None), "{}", kind);

        let x = instance(&model, -1.8);
        let explanation = explainer.explain("subject", &x, None).unwrap();
        let expected = raw_score(&model, &x);
        assert!(
            (explanation.model_output() - expected).abs() < 1e-6,
            "{}: {} vs {}",
            kind,
            explanation.model_output(),
            expected
        );
    }
}

#[test]
fn test_contribution_importance_covers_every_feature() {
    let model = trained(ModelKind::DecisionTree);
    let explainer = ContributionExplainer::new(true);
    explainer.create("subject", Arc::clone(&model), None);

    let background = model.background().unwrap().clone();
    let names = model.feature_names().to_vec();
    let importance = explainer.get_feature_importance("subject", &background, Some(&names)).unwrap();

    assert_eq!(importance.len(), 3);
    let signal = importance["signal"];
    assert!(importance.values().all(|v| *v <= signal));
}

#[test]
fn test_contribution_registry_errors() {
    let model = trained(ModelKind::DecisionTree);
    let x = instance(&model, 1.0);

    let explainer = ContributionExplainer::new(true);
    assert!(matches!(explainer.explain("subject", &x, None), Err(ExplainError::NoExplainer(_))));

    let disabled = ContributionExplainer::new(false);
    assert!(!disabled.create("subject", Arc::clone(&model), None));
    assert!(matches!(disabled.explain("subject", &x, None), Err(ExplainError::Unavailable(_))));

    explainer.create("subject", model, None);
    assert!(explainer.remove_explainer("subject"));
    assert!(!explainer.has_explainer("subject"));
}

// ============================================================================
// Perturbation
// ============================================================================

#[test]
fn test_perturbation_ranks_signal_first() {
    let model = trained(ModelKind::RandomForest);
    let explainer = PerturbationExplainer::new(true);
    let names = model.feature_names().to_vec();
    assert!(explainer.create_explainer(
        model.background().unwrap(),
        &names,
        Some(vec!["0".to_string(), "1".to_string()]),
        "subject",
    ));

    let x = instance(&model, 2.5);
    let predict = prediction_fn(Arc::clone(&model));
    let explanation = explainer
        .explain_prediction("subject", &x, &*predict, 2, 500, &ExplainBudget::unbounded())
        .unwrap();

    assert_eq!(explanation.explanation_list.len(), 2);
    assert!(explanation.explanation_list[0].0.contains("signal"), "{:?}", explanation.explanation_list);
    assert!(explanation.feature_contributions.contains_key("signal"));
}

#[test]
fn test_perturbation_without_explainer() {
    let model = trained(ModelKind::DecisionTree);
    let explainer = PerturbationExplainer::new(true);
    let predict = prediction_fn(Arc::clone(&model));
    let x = instance(&model, 1.0);

    let result = explainer.explain_prediction("unregistered", &x, &*predict, 3, 50, &ExplainBudget::unbounded());
    assert!(matches!(result, Err(ExplainError::NoExplainer(_))));
}

#[test]
fn test_perturbation_respects_cancellation() {
    let model = trained(ModelKind::DecisionTree);
    let explainer = PerturbationExplainer::new(true);
    let names = model.feature_names().to_vec();
    explainer.create_explainer(model.background().unwrap(), &names, None, "subject");

    let budget = ExplainBudget::unbounded();
    budget.cancel();
    let predict = prediction_fn(Arc::clone(&model));
    let result = explainer.explain_prediction("subject", &instance(&model, 1.0), &*predict, 3, 500, &budget);
    assert!(matches!(result, Err(ExplainError::Cancelled)));
}
