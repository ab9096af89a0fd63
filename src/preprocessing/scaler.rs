//! Standard (z-score) feature scaling

use crate::error::{DecisionError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column parameters of a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Z-score scaler: `(x - mean) / std`.
///
/// Constant columns get a unit scale so they map to zero instead of NaN.
/// Using the scaler before [`StandardScaler::fit`] is an untrained-model
/// error, never a silent pass-through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit column means and standard deviations
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(DecisionError::DataError(
                "Cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| DecisionError::ComputationError("column means undefined".to_string()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| {
            if s.is_finite() && s > f64::EPSILON {
                s
            } else {
                1.0
            }
        });

        self.params = Some(ScalerParams { mean, scale });
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.mean.len())
    }

    /// Scale a matrix with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(DecisionError::NotTrained)?;

        if x.ncols() != params.mean.len() {
            return Err(DecisionError::ShapeError {
                expected: format!("{} columns", params.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        Ok((x - &params.mean) / &params.scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
