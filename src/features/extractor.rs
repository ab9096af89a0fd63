//! Raw payload to feature vector extraction

use super::{FeatureVector, RawFeatures};
use crate::error::{DecisionError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const TIER_ONE_LOCATIONS: [&str; 6] = [
    "United States",
    "San Francisco",
    "New York",
    "Boston",
    "London",
    "Singapore",
];
const TIER_TWO_LOCATIONS: [&str; 5] = ["Canada", "Germany", "France", "Israel", "Australia"];

/// Input attributes the extractor understands
const KNOWN_INPUTS: [&str; 30] = [
    "revenue",
    "revenue_growth",
    "recurring_revenue_ratio",
    "funding_amount",
    "previous_funding",
    "funding_stage",
    "burn_rate",
    "runway_months",
    "unit_economics_score",
    "founded_date",
    "sector",
    "business_model",
    "geography",
    "employee_count",
    "employee_growth",
    "market_size",
    "competition_level",
    "market_growth_rate",
    "market_penetration",
    "founder_experience",
    "team_size",
    "technical_team_ratio",
    "advisor_count",
    "previous_exits",
    "product_readiness",
    "customer_count",
    "customer_acquisition_cost",
    "customer_lifetime_value",
    "churn_rate",
    "nps_score",
];

/// Description of the extractor's tables, for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub feature_names: Vec<String>,
    pub funding_stages: Vec<String>,
    pub sectors: Vec<String>,
    pub competition_levels: Vec<String>,
    pub business_models: Vec<String>,
}

/// Deterministic feature extractor.
///
/// Output depends only on the lookup tables, the payload and the clock
/// (for the `current_*` features). Extraction never fails: a payload that
/// carries none of the known attributes, or one that produces a non-finite
/// value, yields [`FeatureExtractor::default_features`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    funding_stages: HashMap<String, f64>,
    sectors: HashMap<String, f64>,
    competition_levels: HashMap<String, f64>,
    business_models: HashMap<String, f64>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        fn table(entries: &[(&str, f64)]) -> HashMap<String, f64> {
            entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        }

        Self {
            funding_stages: table(&[
                ("Pre-Seed", 1.0),
                ("Seed", 2.0),
                ("Series A", 3.0),
                ("Series B", 4.0),
                ("Series C", 5.0),
                ("Series D", 6.0),
                ("Later Stage", 7.0),
                ("IPO", 8.0),
            ]),
            sectors: table(&[
                ("AI/ML", 1.0),
                ("FinTech", 2.0),
                ("HealthTech", 3.0),
                ("E-commerce", 4.0),
                ("SaaS", 5.0),
                ("Biotech", 6.0),
                ("CleanTech", 7.0),
                ("EdTech", 8.0),
                ("Gaming", 9.0),
                ("Hardware", 10.0),
                ("Other", 0.0),
            ]),
            competition_levels: table(&[("low", 1.0), ("medium", 2.0), ("high", 3.0)]),
            business_models: table(&[
                ("B2B", 1.0),
                ("B2C", 2.0),
                ("B2B2C", 3.0),
                ("Marketplace", 4.0),
                ("SaaS", 5.0),
                ("Hardware", 6.0),
                ("Subscription", 7.0),
                ("Freemium", 8.0),
            ]),
        }
    }

    /// Extract features relative to the current wall-clock time
    pub fn transform(&self, raw: &RawFeatures) -> FeatureVector {
        self.transform_at(raw, Utc::now())
    }

    /// Extract features relative to `now`
    pub fn transform_at(&self, raw: &RawFeatures, now: DateTime<Utc>) -> FeatureVector {
        if !KNOWN_INPUTS.iter().any(|key| raw.contains_key(*key)) {
            debug!(fields = raw.len(), "No recognised attributes in payload, using default features");
            return Self::default_features();
        }

        match self.try_transform(raw, now) {
            Ok(features) => {
                debug!(n_features = features.len(), "Extracted features");
                features
            }
            Err(e) => {
                warn!(error = %e, "Feature extraction failed, using default features");
                Self::default_features()
            }
        }
    }

    fn try_transform(&self, raw: &RawFeatures, now: DateTime<Utc>) -> Result<FeatureVector> {
        let mut features = FeatureVector::new();

        self.financial_features(raw, &mut features);
        self.company_features(raw, now, &mut features);
        self.market_features(raw, &mut features);
        temporal_features(raw, now, &mut features);
        team_features(raw, &mut features);
        product_features(raw, &mut features);

        if let Some((name, value)) = features.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DecisionError::DataError(format!(
                "feature {} evaluated to {}",
                name, value
            )));
        }

        Ok(features)
    }

    fn financial_features(&self, raw: &RawFeatures, out: &mut FeatureVector) {
        out.set("revenue", safe_float(raw.get("revenue")));
        out.set("revenue_growth", safe_float(raw.get("revenue_growth")));
        out.set("recurring_revenue_ratio", safe_float(raw.get("recurring_revenue_ratio")));
        out.set("funding_amount", safe_float(raw.get("funding_amount")));
        out.set("previous_funding", safe_float(raw.get("previous_funding")));
        out.set(
            "funding_stage_numeric",
            lookup(&self.funding_stages, raw.get("funding_stage"), 0.0),
        );
        out.set("burn_rate", safe_float(raw.get("burn_rate")));
        out.set("runway_months", safe_float(raw.get("runway_months")));
        out.set("unit_economics_score", safe_float(raw.get("unit_economics_score")));
    }

    fn company_features(&self, raw: &RawFeatures, now: DateTime<Utc>, out: &mut FeatureVector) {
        out.set("company_age", company_age(raw.get("founded_date"), now));
        out.set("sector_numeric", lookup(&self.sectors, raw.get("sector"), 0.0));
        out.set(
            "business_model_numeric",
            lookup(&self.business_models, raw.get("business_model"), 0.0),
        );
        out.set("geography_tier", geography_tier(raw.get("geography")));
        out.set("employee_count", safe_int(raw.get("employee_count")));
        out.set("employee_growth", safe_float(raw.get("employee_growth")));
    }

    fn market_features(&self, raw: &RawFeatures, out: &mut FeatureVector) {
        out.set("market_size", safe_float(raw.get("market_size")));
        let competition = match raw.get("competition_level") {
            None | Some(Value::Null) => 2.0,
            level => lookup(&self.competition_levels, level, 2.0),
        };
        out.set("competition_level_numeric", competition);
        out.set("market_growth_rate", safe_float(raw.get("market_growth_rate")));
        out.set("market_penetration", safe_float(raw.get("market_penetration")));
    }

    /// Neutral vector returned when extraction cannot proceed
    pub fn default_features() -> FeatureVector {
        FeatureVector::from_pairs([
            ("revenue", 0.0),
            ("revenue_growth", 0.0),
            ("funding_amount", 0.0),
            ("company_age", 0.0),
            ("sector_numeric", 0.0),
            ("funding_stage_numeric", 0.0),
            ("business_model_numeric", 0.0),
            ("market_size", 0.0),
            ("competition_level_numeric", 2.0),
            ("employee_count", 0.0),
            ("founder_experience", 0.0),
            ("product_readiness", 0.0),
            ("customer_count", 0.0),
            ("ltv_cac_ratio", 0.0),
            ("geography_tier", 3.0),
        ])
    }

    /// Names of the neutral feature set
    pub fn feature_names(&self) -> Vec<String> {
        Self::default_features().names().to_vec()
    }

    pub fn get_feature_info(&self) -> FeatureInfo {
        fn sorted_keys(table: &HashMap<String, f64>) -> Vec<String> {
            let mut entries: Vec<(&String, &f64)> = table.iter().collect();
            entries.sort_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
            entries.into_iter().map(|(k, _)| k.clone()).collect()
        }

        FeatureInfo {
            feature_names: self.feature_names(),
            funding_stages: sorted_keys(&self.funding_stages),
            sectors: sorted_keys(&self.sectors),
            competition_levels: sorted_keys(&self.competition_levels),
            business_models: sorted_keys(&self.business_models),
        }
    }
}

fn temporal_features(raw: &RawFeatures, now: DateTime<Utc>, out: &mut FeatureVector) {
    out.set("current_year", now.year() as f64);
    out.set("current_month", now.month() as f64);
    out.set("current_quarter", quarter(now.month()) as f64);

    if let Some(founded) = parse_date(raw.get("founded_date")) {
        out.set("founded_year", founded.year() as f64);
        out.set("founded_quarter", quarter(founded.month()) as f64);
        let age_days = (now.date_naive() - founded).num_days();
        out.set("is_recent_company", if age_days < 365 * 3 { 1.0 } else { 0.0 });
    }
}

fn team_features(raw: &RawFeatures, out: &mut FeatureVector) {
    out.set("founder_experience", safe_float(raw.get("founder_experience")));
    out.set("team_size", safe_int(raw.get("team_size")));
    out.set("technical_team_ratio", safe_float(raw.get("technical_team_ratio")));
    out.set("advisor_count", safe_int(raw.get("advisor_count")));
    out.set("previous_exits", safe_int(raw.get("previous_exits")));
}

fn product_features(raw: &RawFeatures, out: &mut FeatureVector) {
    let cac = safe_float(raw.get("customer_acquisition_cost"));
    let ltv = safe_float(raw.get("customer_lifetime_value"));

    out.set("product_readiness", safe_float(raw.get("product_readiness")));
    out.set("customer_count", safe_int(raw.get("customer_count")));
    out.set("customer_acquisition_cost", cac);
    out.set("customer_lifetime_value", ltv);
    out.set("churn_rate", safe_float(raw.get("churn_rate")));
    out.set("nps_score", safe_float(raw.get("nps_score")));
    out.set("ltv_cac_ratio", guarded_ratio(ltv, cac));
}

/// `numerator / denominator`, or 0 when the denominator is not positive
pub(crate) fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

fn lookup(table: &HashMap<String, f64>, value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::String(s)) => table.get(s.as_str()).copied().unwrap_or(0.0),
        None | Some(Value::Null) => default,
        Some(_) => 0.0,
    }
}

fn geography_tier(value: Option<&Value>) -> f64 {
    let location = match value {
        Some(Value::String(s)) => s.as_str(),
        _ => return 3.0,
    };

    if TIER_ONE_LOCATIONS.iter().any(|m| location.contains(m)) {
        1.0
    } else if TIER_TWO_LOCATIONS.iter().any(|m| location.contains(m)) {
        2.0
    } else {
        3.0
    }
}

fn safe_float(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn safe_int(value: Option<&Value>) -> f64 {
    let v = safe_float(value);
    if v.is_finite() {
        v.trunc()
    } else {
        0.0
    }
}

fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let text = match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
        _ => return None,
    };

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Fractional years since founding, clamped at zero
fn company_age(value: Option<&Value>, now: DateTime<Utc>) -> f64 {
    match parse_date(value) {
        Some(founded) => {
            let days = (now.date_naive() - founded).num_days();
            (days as f64 / 365.25).max(0.0)
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    fn payload(value: serde_json::Value) -> RawFeatures {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lookup_tables() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({
            "funding_stage": "Series A",
            "sector": "FinTech",
            "business_model": "Marketplace",
            "competition_level": "high",
            "geography": "San Francisco, CA",
        }));

        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("funding_stage_numeric"), Some(3.0));
        assert_eq!(features.get("sector_numeric"), Some(2.0));
        assert_eq!(features.get("business_model_numeric"), Some(4.0));
        assert_eq!(features.get("competition_level_numeric"), Some(3.0));
        assert_eq!(features.get("geography_tier"), Some(1.0));
    }

    #[test]
    fn test_unknown_categories_map_to_zero() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({
            "funding_stage": "Series Z",
            "sector": "Quantum Farming",
            "business_model": 42,
            "competition_level": "fierce",
            "geography": "Mars",
        }));

        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("funding_stage_numeric"), Some(0.0));
        assert_eq!(features.get("sector_numeric"), Some(0.0));
        assert_eq!(features.get("business_model_numeric"), Some(0.0));
        assert_eq!(features.get("competition_level_numeric"), Some(0.0));
        assert_eq!(features.get("geography_tier"), Some(3.0));
    }

    #[test]
    fn test_competition_defaults_to_medium() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({"revenue": 10}));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("competition_level_numeric"), Some(2.0));
    }

    #[test]
    fn test_guarded_ratio() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({
            "customer_lifetime_value": 900,
            "customer_acquisition_cost": 0,
        }));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("ltv_cac_ratio"), Some(0.0));

        let raw = payload(json!({
            "customer_lifetime_value": 900,
            "customer_acquisition_cost": "300",
        }));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("ltv_cac_ratio"), Some(3.0));
    }

    #[test]
    fn test_company_age_and_temporal_features() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({"founded_date": "2022-05-15"}));
        let features = extractor.transform_at(&raw, fixed_now());

        let age = features.get("company_age").unwrap();
        assert!((age - 731.0 / 365.25).abs() < 1e-9, "age = {}", age);
        assert_eq!(features.get("current_year"), Some(2024.0));
        assert_eq!(features.get("current_quarter"), Some(2.0));
        assert_eq!(features.get("founded_year"), Some(2022.0));
        assert_eq!(features.get("is_recent_company"), Some(1.0));
    }

    #[test]
    fn test_unparsable_date_yields_zero_age() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({"founded_date": "last spring"}));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("company_age"), Some(0.0));
        assert_eq!(features.get("founded_year"), None);

        let future = payload(json!({"founded_date": "2030-01-01"}));
        let features = extractor.transform_at(&future, fixed_now());
        assert_eq!(features.get("company_age"), Some(0.0));
    }

    #[test]
    fn test_tolerant_numeric_coercion() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({
            "revenue": "1500.5",
            "employee_count": 12.9,
            "team_size": "n/a",
            "advisor_count": true,
        }));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features.get("revenue"), Some(1500.5));
        assert_eq!(features.get("employee_count"), Some(12.0));
        assert_eq!(features.get("team_size"), Some(0.0));
        assert_eq!(features.get("advisor_count"), Some(1.0));
    }

    #[test]
    fn test_empty_payload_gives_default_vector() {
        let extractor = FeatureExtractor::new();
        let features = extractor.transform_at(&RawFeatures::new(), fixed_now());
        assert_eq!(features, FeatureExtractor::default_features());
        assert_eq!(features.len(), 15);
    }

    #[test]
    fn test_non_finite_value_falls_back_to_defaults() {
        let extractor = FeatureExtractor::new();
        let raw = payload(json!({"revenue": "1e400"}));
        let features = extractor.transform_at(&raw, fixed_now());
        assert_eq!(features, FeatureExtractor::default_features());
    }
}
