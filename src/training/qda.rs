//! Quadratic Discriminant Analysis
//!
//! One Gaussian per class with its own covariance. Scores are the class
//! log-posteriors up to a shared constant:
//!
//! `delta_k(x) = -0.5 * (log|S_k| + (x - mu_k)^T S_k^-1 (x - mu_k)) + log(pi_k)`

use super::decision_tree::{argmax, unique_sorted};
use super::linalg::{cholesky_solve, cholesky_with_jitter, forward_substitution, log_det};
use crate::error::{DecisionError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted Gaussian for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassGaussian {
    mean: Array1<f64>,
    /// Cholesky factor of the regularised covariance
    chol: Array2<f64>,
    log_det: f64,
    log_prior: f64,
    n_samples: usize,
    /// Ridge added to make the covariance positive definite
    jitter: f64,
}

/// Summary statistics for one fitted class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStatistics {
    pub class: f64,
    pub n_samples: usize,
    pub prior: f64,
    pub mean: Vec<f64>,
    pub covariance_log_det: f64,
    pub jitter: f64,
}

/// Model-level summary of a fitted QDA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdaInfo {
    pub n_classes: usize,
    pub n_features: usize,
    pub reg_param: f64,
    pub tol: f64,
    pub priors: Vec<f64>,
}

/// Quadratic discriminant classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticDiscriminant {
    /// Shrinkage towards the identity: `(1 - r) * S + r * I`
    pub reg_param: f64,
    /// Smallest ridge tried when a covariance is singular
    pub tol: f64,
    /// Fixed class priors; estimated from class frequencies when `None`
    pub priors: Option<Vec<f64>>,
    classes: Vec<f64>,
    gaussians: Vec<ClassGaussian>,
    n_features: usize,
}

impl Default for QuadraticDiscriminant {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadraticDiscriminant {
    pub fn new() -> Self {
        Self {
            reg_param: 0.0,
            tol: 1e-4,
            priors: None,
            classes: Vec::new(),
            gaussians: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_reg_param(mut self, reg_param: f64) -> Self {
        self.reg_param = reg_param;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_priors(mut self, priors: Vec<f64>) -> Self {
        self.priors = Some(priors);
        self
    }

    /// Fit per-class means and covariances
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples != y.len() {
            return Err(DecisionError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if !(0.0..=1.0).contains(&self.reg_param) {
            return Err(DecisionError::InvalidParameter {
                name: "reg_param".to_string(),
                value: self.reg_param.to_string(),
                reason: "must lie in [0, 1]".to_string(),
            });
        }

        let classes = unique_sorted(y);
        if classes.len() < 2 {
            return Err(DecisionError::TrainingError(format!(
                "QDA needs at least two classes, got {}",
                classes.len()
            )));
        }

        let priors = match &self.priors {
            Some(p) if p.len() != classes.len() => {
                return Err(DecisionError::InvalidParameter {
                    name: "priors".to_string(),
                    value: format!("{:?}", p),
                    reason: format!("expected {} entries", classes.len()),
                })
            }
            Some(p) => {
                let total: f64 = p.iter().sum();
                p.iter().map(|v| v / total).collect()
            }
            None => classes
                .iter()
                .map(|c| y.iter().filter(|v| *v == c).count() as f64 / n_samples as f64)
                .collect::<Vec<f64>>(),
        };

        let mut gaussians = Vec::with_capacity(classes.len());
        for (class, prior) in classes.iter().zip(&priors) {
            let rows: Vec<usize> = (0..n_samples).filter(|&i| y[i] == *class).collect();
            if rows.len() < 2 {
                return Err(DecisionError::TrainingError(format!(
                    "class {} has fewer than two samples, covariance is undefined",
                    class
                )));
            }

            let xk = x.select(Axis(0), &rows);
            let mean = xk
                .mean_axis(Axis(0))
                .ok_or_else(|| DecisionError::ComputationError("empty class".to_string()))?;
            let centered = &xk - &mean;
            let mut cov = centered.t().dot(&centered) / (rows.len() as f64 - 1.0);

            if self.reg_param > 0.0 {
                cov *= 1.0 - self.reg_param;
                for k in 0..n_features {
                    cov[[k, k]] += self.reg_param;
                }
            }

            let (chol, jitter) = cholesky_with_jitter(&cov, self.tol)?;
            if jitter > 0.0 {
                tracing::debug!(class = *class, jitter, "covariance regularised");
            }

            gaussians.push(ClassGaussian {
                log_det: log_det(&chol),
                mean,
                chol,
                log_prior: prior.max(f64::MIN_POSITIVE).ln(),
                n_samples: rows.len(),
                jitter,
            });
        }

        self.classes = classes;
        self.gaussians = gaussians;
        self.n_features = n_features;
        Ok(self)
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.gaussians.is_empty() {
            return Err(DecisionError::NotTrained);
        }
        if x.ncols() != self.n_features {
            return Err(DecisionError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Per-class discriminant scores, one column per class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted(x)?;

        let mut scores = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, g) in self.gaussians.iter().enumerate() {
                let diff = &row - &g.mean;
                let z = forward_substitution(&g.chol, &diff);
                let mahalanobis = z.dot(&z);
                scores[[i, k]] = -0.5 * (g.log_det + mahalanobis) + g.log_prior;
            }
        }
        Ok(scores)
    }

    /// Class posteriors via a stable softmax of the discriminant scores
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut scores = self.decision_function(x)?;
        for mut row in scores.rows_mut() {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row /= sum;
        }
        if scores.iter().any(|v| !v.is_finite()) {
            return Err(DecisionError::ComputationError(
                "non-finite class posterior".to_string(),
            ));
        }
        Ok(scores)
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                let values = row.to_vec();
                argmax(&values).map(|c| self.classes[c]).unwrap_or(0.0)
            })
            .collect())
    }

    /// Mean over classes of `|S_k^-1 mu_k|`, normalised to sum to 1.
    ///
    /// Falls back to uniform weights when the coefficients are degenerate.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.gaussians.is_empty() {
            return None;
        }

        let n = self.n_features;
        let mut importance: Array1<f64> = Array1::zeros(n);
        for g in &self.gaussians {
            importance += &cholesky_solve(&g.chol, &g.mean).mapv(f64::abs);
        }
        importance /= self.gaussians.len() as f64;

        let total = importance.sum();
        if total > 0.0 && total.is_finite() {
            Some(importance / total)
        } else {
            Some(Array1::from_elem(n, 1.0 / n.max(1) as f64))
        }
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        !self.gaussians.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn class_statistics(&self) -> Vec<ClassStatistics> {
        self.classes
            .iter()
            .zip(&self.gaussians)
            .map(|(class, g)| ClassStatistics {
                class: *class,
                n_samples: g.n_samples,
                prior: g.log_prior.exp(),
                mean: g.mean.to_vec(),
                covariance_log_det: g.log_det,
                jitter: g.jitter,
            })
            .collect()
    }

    pub fn model_info(&self) -> QdaInfo {
        QdaInfo {
            n_classes: self.classes.len(),
            n_features: self.n_features,
            reg_param: self.reg_param,
            tol: self.tol,
            priors: self.gaussians.iter().map(|g| g.log_prior.exp()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_gaussians() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1],
            [0.2, -0.1],
            [-0.1, 0.0],
            [0.1, 0.2],
            [-0.2, -0.2],
            [3.0, 3.1],
            [3.4, 2.8],
            [2.7, 3.0],
            [3.1, 3.5],
            [2.9, 2.6],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_importance_is_normalised() {
        let (x, y) = two_gaussians();
        let mut qda = QuadraticDiscriminant::new();
        qda.fit(&x, &y).unwrap();

        let importance = qda.feature_importances().unwrap();
        assert_eq!(importance.len(), 2);
        assert!(importance.iter().all(|v| *v >= 0.0));
        assert!((importance.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_means_fall_back_to_uniform_importance() {
        // both classes are centred on the origin
        let x = array![
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, -1.0],
            [-1.0, 1.0],
            [2.0, 2.0],
            [-2.0, -2.0],
            [2.0, -2.0],
            [-2.0, 2.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut qda = QuadraticDiscriminant::new();
        qda.fit(&x, &y).unwrap();

        assert_eq!(qda.feature_importances().unwrap(), array![0.5, 0.5]);
    }

    #[test]
    fn test_qda_separates_classes() {
        let (x, y) = two_gaussians();
        let mut qda = QuadraticDiscriminant::new();
        qda.fit(&x, &y).unwrap();

        assert_eq!(qda.predict(&x).unwrap(), y);
        let proba = qda.predict_proba(&array![[3.0, 3.0]]).unwrap();
        assert!(proba[[0, 1]] > 0.99);
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_covariance_is_regularised() {
        // second column is constant inside each class
        let x = array![[0.0, 1.0], [0.5, 1.0], [1.0, 1.0], [5.0, 2.0], [5.5, 2.0], [6.0, 2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut qda = QuadraticDiscriminant::new();
        qda.fit(&x, &y).unwrap();
        assert!(qda.class_statistics().iter().all(|s| s.jitter > 0.0));
        assert_eq!(qda.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_importance_sums_to_one() {
        let (x, y) = two_gaussians();
        let mut qda = QuadraticDiscriminant::new().with_reg_param(0.1);
        qda.fit(&x, &y).unwrap();

        let importance = qda.feature_importances().unwrap();
        assert!((importance.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.0, 1.0];
        assert!(QuadraticDiscriminant::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_unfitted_qda() {
        let qda = QuadraticDiscriminant::new();
        assert!(matches!(qda.predict(&array![[0.0]]), Err(DecisionError::NotTrained)));
        assert!(qda.feature_importances().is_none());
    }
}
