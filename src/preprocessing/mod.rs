//! Data preprocessing module
//!
//! Turns tabular training input and single-instance feature maps into the
//! numeric matrices estimators consume:
//! - Fixed-vocabulary label encoding of text columns
//! - Standard scaling fitted on the training split
//! - [`FeaturePipeline`], the per-model bundle of both

mod encoder;
mod scaler;

pub use encoder::{vocabulary_for, CategoricalEncoders, VocabularyEncoder};
pub use scaler::StandardScaler;

use crate::error::{DecisionError, Result};
use crate::features::{FeatureMap, FeatureValue};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column data type as seen at training time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Encoding and scaling state owned by one model.
///
/// Column order follows the feature-name list handed to
/// [`FeaturePipeline::fit_frame`]. Matrices produced by
/// [`FeaturePipeline::encode_frame`] and [`FeaturePipeline::encode_row`] are
/// encoded but unscaled; [`FeaturePipeline::transform`] applies the scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    encode_categoricals: bool,
    scale: bool,
    column_types: Vec<ColumnType>,
    encoders: CategoricalEncoders,
    scaler: StandardScaler,
}

impl FeaturePipeline {
    /// Label-encode text columns and standard-scale everything
    pub fn encoded_and_scaled() -> Self {
        Self {
            encode_categoricals: true,
            scale: true,
            column_types: Vec::new(),
            encoders: CategoricalEncoders::new(),
            scaler: StandardScaler::new(),
        }
    }

    /// Numeric coercion only: text parses as a number or becomes 0
    pub fn numeric_passthrough() -> Self {
        Self {
            encode_categoricals: false,
            scale: false,
            ..Self::encoded_and_scaled()
        }
    }

    /// A fresh, unfitted pipeline with the same encoding and scaling policy
    pub fn unfitted(&self) -> Self {
        Self {
            encode_categoricals: self.encode_categoricals,
            scale: self.scale,
            ..Self::encoded_and_scaled()
        }
    }

    pub fn scales(&self) -> bool {
        self.scale
    }

    /// Record column types, fit encoders, and return the encoded matrix
    pub fn fit_frame(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        let mut types = Vec::with_capacity(columns.len());
        let mut col_data = Vec::with_capacity(columns.len());

        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| DecisionError::InvalidFeatures(format!("missing column {}", name)))?;

            if matches!(column.dtype(), DataType::String) {
                let ca = column.str()?;
                let values: Vec<f64> = if self.encode_categoricals {
                    ca.into_iter()
                        .map(|v| self.encoders.fit_encode(name, v.unwrap_or("")))
                        .collect()
                } else {
                    ca.into_iter()
                        .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0))
                        .collect()
                };
                types.push(ColumnType::Categorical);
                col_data.push(values);
            } else {
                types.push(ColumnType::Numeric);
                col_data.push(numeric_column(column)?);
            }
        }

        self.column_types = types;
        let n_rows = df.height();
        Ok(Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| col_data[c][r]))
    }

    /// Encode a frame with the already fitted column types
    pub fn encode_frame(&self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        if self.column_types.len() != columns.len() {
            return Err(DecisionError::NotTrained);
        }

        let col_data: Vec<Vec<f64>> = columns
            .iter()
            .zip(&self.column_types)
            .map(|(name, column_type)| {
                let column = match df.column(name) {
                    Ok(c) => c,
                    // missing columns fall back to the neutral value
                    Err(_) => return Ok(vec![0.0; df.height()]),
                };
                match (column_type, column.dtype()) {
                    (ColumnType::Categorical, DataType::String) if self.encode_categoricals => {
                        let ca = column.str()?;
                        Ok(ca
                            .into_iter()
                            .map(|v| self.encoders.encode(name, v.unwrap_or("")))
                            .collect())
                    }
                    (_, DataType::String) => {
                        let ca = column.str()?;
                        Ok(ca
                            .into_iter()
                            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0))
                            .collect())
                    }
                    _ => numeric_column(column),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Array2::from_shape_fn((df.height(), columns.len()), |(r, c)| col_data[c][r]))
    }

    /// Fit the scaler on the (encoded) training split
    pub fn fit_scaler(&mut self, x_train: &Array2<f64>) -> Result<()> {
        if self.scale {
            self.scaler.fit(x_train)?;
        }
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.column_types.is_empty() && (!self.scale || self.scaler.is_fitted())
    }

    /// Encode one instance in `names` order.
    ///
    /// Extra keys are ignored. Missing keys take the neutral value: 0 for
    /// numeric columns, code 0 for categorical ones.
    pub fn encode_row(&self, features: &FeatureMap, names: &[String]) -> Array1<f64> {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let column_type = self.column_types.get(idx).copied().unwrap_or(ColumnType::Numeric);
                match (features.get(name), column_type) {
                    (None, _) => 0.0,
                    (Some(value), ColumnType::Categorical) if self.encode_categoricals => {
                        self.encoders.encode(name, &value.as_text())
                    }
                    (Some(value), _) => value.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
                }
            })
            .collect()
    }

    /// Apply the fitted scaler (identity when scaling is disabled)
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(DecisionError::NotTrained);
        }
        if self.scale {
            self.scaler.transform(x)
        } else {
            Ok(x.clone())
        }
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    pub fn encoders(&self) -> &CategoricalEncoders {
        &self.encoders
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// A representative value for a column, used to synthesise probe inputs
    pub fn probe_value(&self, idx: usize, name: &str) -> Option<FeatureValue> {
        match self.column_types.get(idx) {
            Some(ColumnType::Categorical) if self.encode_categoricals => vocabulary_for(name)
                .first()
                .map(|v| FeatureValue::Text(v.to_string())),
            _ => None,
        }
    }
}

fn numeric_column(column: &Column) -> Result<Vec<f64>> {
    let as_f64 = column
        .cast(&DataType::Float64)
        .map_err(|e| DecisionError::DataError(e.to_string()))?;
    Ok(as_f64
        .f64()
        .map_err(|e| DecisionError::DataError(e.to_string()))?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
        .collect())
}
