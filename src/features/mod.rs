//! Feature representation and extraction
//!
//! Raw client payloads arrive as loosely typed JSON objects. The
//! [`FeatureExtractor`] turns them into an ordered [`FeatureVector`], which
//! converts into the [`FeatureMap`] that models score.

mod extractor;

pub use extractor::{FeatureExtractor, FeatureInfo};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Loosely typed input attributes, keyed by attribute name
pub type RawFeatures = serde_json::Map<String, serde_json::Value>;

/// Model input keyed by feature name
pub type FeatureMap = HashMap<String, FeatureValue>;

/// A single model input value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value. Text that parses as a number counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Text view of the value, formatting numbers with their shortest form.
    pub fn as_text(&self) -> String {
        match self {
            FeatureValue::Number(v) => v.to_string(),
            FeatureValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

/// Ordered numeric feature vector.
///
/// The name list is the source of truth for column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, keeping their order
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut vector = Self::new();
        for (name, value) in pairs {
            vector.set(name, value);
        }
        vector
    }

    /// Set a value, appending the name if it is new
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Convert into the keyed form models accept
    pub fn to_feature_map(&self) -> FeatureMap {
        self.iter()
            .map(|(name, value)| (name.to_string(), FeatureValue::Number(value)))
            .collect()
    }
}
