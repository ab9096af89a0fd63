//! Integration test: feature extraction from raw payloads

use chrono::{TimeZone, Utc};
use decision_core::features::{FeatureExtractor, FeatureValue, FeatureVector, RawFeatures};
use serde_json::json;

fn payload(value: serde_json::Value) -> RawFeatures {
    value.as_object().cloned().unwrap()
}

fn startup() -> RawFeatures {
    payload(json!({
        "revenue": 2_500_000,
        "revenue_growth": 0.8,
        "funding_amount": "12000000",
        "funding_stage": "Series B",
        "founded_date": "2019-03-01",
        "sector": "SaaS",
        "business_model": "B2B",
        "geography": "London",
        "employee_count": 85,
        "competition_level": "medium",
        "customer_lifetime_value": 12000,
        "customer_acquisition_cost": 3000,
        "founder_experience": 10,
        "product_readiness": 0.9,
        "customer_count": 450,
    }))
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_empty_payload_is_the_default_vector() {
    let extractor = FeatureExtractor::new();
    let features = extractor.transform(&RawFeatures::new());

    assert_eq!(features, FeatureExtractor::default_features());
    assert_eq!(features.len(), 15);
    assert_eq!(features.get("competition_level_numeric"), Some(2.0));
    assert_eq!(features.get("geography_tier"), Some(3.0));
}

#[test]
fn test_unrecognised_payload_is_the_default_vector() {
    let extractor = FeatureExtractor::new();
    let features = extractor.transform(&payload(json!({"colour": "blue", "mood": 7})));
    assert_eq!(features, FeatureExtractor::default_features());
}

#[test]
fn test_feature_names_match_default_vector() {
    let extractor = FeatureExtractor::new();
    assert_eq!(extractor.feature_names(), FeatureExtractor::default_features().names().to_vec());
}

// ============================================================================
// Full payloads
// ============================================================================

#[test]
fn test_full_payload_is_deterministic() {
    let extractor = FeatureExtractor::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();

    let first = extractor.transform_at(&startup(), now);
    let second = extractor.transform_at(&startup(), now);

    assert_eq!(first, second);
    assert!(first.values().iter().all(|v| v.is_finite()));
    assert_eq!(first.get("funding_amount"), Some(12_000_000.0));
    assert_eq!(first.get("funding_stage_numeric"), Some(4.0));
    assert_eq!(first.get("sector_numeric"), Some(5.0));
    assert_eq!(first.get("business_model_numeric"), Some(1.0));
    assert_eq!(first.get("geography_tier"), Some(1.0));
    assert_eq!(first.get("ltv_cac_ratio"), Some(4.0));
    assert_eq!(first.get("founded_year"), Some(2019.0));
    assert_eq!(first.get("current_year"), Some(2025.0));
    assert_eq!(first.get("is_recent_company"), Some(0.0));
}

#[test]
fn test_unknown_categories_score_zero() {
    let extractor = FeatureExtractor::new();
    let mut raw = startup();
    raw.insert("sector".to_string(), json!("Space Mining"));
    raw.insert("funding_stage".to_string(), json!("Series Q"));

    let features = extractor.transform(&raw);
    assert_eq!(features.get("sector_numeric"), Some(0.0));
    assert_eq!(features.get("funding_stage_numeric"), Some(0.0));
}

#[test]
fn test_zero_acquisition_cost_guards_ratio() {
    let extractor = FeatureExtractor::new();
    let mut raw = startup();
    raw.insert("customer_acquisition_cost".to_string(), json!(0));

    let features = extractor.transform(&raw);
    assert_eq!(features.get("ltv_cac_ratio"), Some(0.0));
}

// ============================================================================
// Feature vector
// ============================================================================

#[test]
fn test_feature_map_carries_every_value() {
    let extractor = FeatureExtractor::new();
    let features = extractor.transform(&startup());
    let map = features.to_feature_map();

    assert_eq!(map.len(), features.len());
    for (name, value) in features.iter() {
        assert_eq!(map.get(name), Some(&FeatureValue::Number(value)));
    }
}

#[test]
fn test_set_replaces_in_place() {
    let mut features = FeatureVector::from_pairs([("a", 1.0), ("b", 2.0)]);
    features.set("a", 5.0);
    features.set("c", 3.0);

    assert_eq!(features.names(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    assert_eq!(features.values(), &[5.0, 2.0, 3.0]);
}

#[test]
fn test_feature_info_lists_lookup_tables() {
    let info = FeatureExtractor::new().get_feature_info();
    assert!(info.funding_stages.contains(&"Series A".to_string()));
    assert!(info.competition_levels.contains(&"high".to_string()));
}
