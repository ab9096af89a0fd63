//! Fixed-vocabulary categorical encoding
//!
//! Encoders are fitted against a hardcoded vocabulary per column rather than
//! the observed training data, so codes stay stable across restarts and
//! retrains. Codes are positions in the alphabetically sorted vocabulary;
//! values outside it encode to 0.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback vocabulary for text columns without a dedicated list
const GENERIC_VOCABULARY: [&str; 3] = ["unknown", "other", "standard"];

/// Known vocabulary for a categorical column
pub fn vocabulary_for(column: &str) -> &'static [&'static str] {
    match column {
        "funding_stage" => &[
            "Pre-Seed",
            "Seed",
            "Series A",
            "Series B",
            "Series C",
            "Later Stage",
        ],
        "sector" => &[
            "AI/ML",
            "FinTech",
            "HealthTech",
            "E-commerce",
            "SaaS",
            "Biotech",
            "CleanTech",
        ],
        "competition_level" => &["low", "medium", "high"],
        "geography" => &["North America", "Europe", "Asia", "Other"],
        "business_model" => &["B2B", "B2C", "B2B2C", "Marketplace", "SaaS", "Hardware"],
        _ => &GENERIC_VOCABULARY,
    }
}

/// Label encoder over one column's fixed vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEncoder {
    classes: Vec<String>,
}

impl VocabularyEncoder {
    /// Fit against the fixed vocabulary of `column`
    pub fn for_column(column: &str) -> Self {
        let mut classes: Vec<String> = vocabulary_for(column).iter().map(|s| s.to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code for `value`; unseen values map to 0
    pub fn encode(&self, value: &str) -> f64 {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|idx| idx as f64)
            .unwrap_or(0.0)
    }
}

/// Fitted encoders for every categorical column a model has seen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoders {
    encoders: BTreeMap<String, VocabularyEncoder>,
}

impl CategoricalEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value, fitting the column's encoder on first use
    pub fn fit_encode(&mut self, column: &str, value: &str) -> f64 {
        self.encoders
            .entry(column.to_string())
            .or_insert_with(|| VocabularyEncoder::for_column(column))
            .encode(value)
    }

    /// Encode a value with the fitted encoder.
    ///
    /// A column with no fitted encoder is encoded against its fixed
    /// vocabulary, which yields the same codes a fitted encoder would.
    pub fn encode(&self, column: &str, value: &str) -> f64 {
        match self.encoders.get(column) {
            Some(encoder) => encoder.encode(value),
            None => VocabularyEncoder::for_column(column).encode(value),
        }
    }

    pub fn get(&self, column: &str) -> Option<&VocabularyEncoder> {
        self.encoders.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_vocabulary() {
        let encoder = VocabularyEncoder::for_column("competition_level");
        // sorted: high, low, medium
        assert_eq!(encoder.encode("high"), 0.0);
        assert_eq!(encoder.encode("low"), 1.0);
        assert_eq!(encoder.encode("medium"), 2.0);
    }

    #[test]
    fn test_unseen_value_maps_to_zero() {
        let mut encoders = CategoricalEncoders::new();
        assert_eq!(encoders.fit_encode("sector", "Space Mining"), 0.0);
        assert_eq!(encoders.encode("sector", "Underwater Basket Weaving"), 0.0);
        assert_eq!(encoders.encode("region", ""), 0.0);
    }

    #[test]
    fn test_unfitted_column_matches_fitted_codes() {
        let mut fitted = CategoricalEncoders::new();
        let code = fitted.fit_encode("funding_stage", "Series B");
        let fresh = CategoricalEncoders::new();
        assert_eq!(fresh.encode("funding_stage", "Series B"), code);
        assert_eq!(fitted.len(), 1);
    }

    #[test]
    fn test_generic_vocabulary() {
        let encoder = VocabularyEncoder::for_column("city");
        assert_eq!(encoder.classes(), &["other", "standard", "unknown"]);
        assert_eq!(encoder.encode("unknown"), 2.0);
    }
}
