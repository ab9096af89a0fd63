//! Small dense linear-algebra helpers built on Cholesky factorisation

use crate::error::{DecisionError, Result};
use ndarray::{Array1, Array2};

/// Lower-triangular Cholesky factor of a symmetric matrix, or `None` if
/// the matrix is not positive definite.
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Cholesky factor after adding the smallest diagonal ridge (from
/// `base_ridge`, growing tenfold) that makes the matrix positive definite.
///
/// Returns the factor and the ridge that was added.
pub fn cholesky_with_jitter(a: &Array2<f64>, base_ridge: f64) -> Result<(Array2<f64>, f64)> {
    if let Some(l) = cholesky(a) {
        return Ok((l, 0.0));
    }

    let n = a.nrows();
    let mean_diag = (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64).max(1.0);
    let mut ridge = base_ridge.max(f64::EPSILON) * mean_diag;

    for _ in 0..8 {
        let mut regularized = a.clone();
        for k in 0..n {
            regularized[[k, k]] += ridge;
        }
        if let Some(l) = cholesky(&regularized) {
            return Ok((l, ridge));
        }
        ridge *= 10.0;
    }

    Err(DecisionError::ComputationError(
        "matrix is not positive definite even after regularisation".to_string(),
    ))
}

/// Solve `L y = b` for lower-triangular `L`
pub fn forward_substitution(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }
    y
}

/// Solve `L^T x = y` for lower-triangular `L`
pub fn backward_substitution(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve `A x = b` given the Cholesky factor of `A`
pub fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    backward_substitution(l, &forward_substitution(l, b))
}

/// `log |A|` from the Cholesky factor of `A`
pub fn log_det(l: &Array2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|v| v.ln()).sum::<f64>()
}

/// Solve a symmetric positive (semi-)definite system, regularising if needed
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    if a.nrows() != b.len() {
        return Err(DecisionError::ShapeError {
            expected: format!("rhs of length {}", a.nrows()),
            actual: format!("rhs of length {}", b.len()),
        });
    }
    let (l, _) = cholesky_with_jitter(a, 1e-10)?;
    Ok(cholesky_solve(&l, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = solve_spd(&a, &b).unwrap();
        let residual = a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-10));
    }

    #[test]
    fn test_log_det() {
        let a = array![[4.0, 0.0], [0.0, 9.0]];
        let l = cholesky(&a).unwrap();
        assert!((log_det(&l) - 36.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_jitter_rescues_singular_matrix() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(cholesky(&a).is_none());
        let (_, ridge) = cholesky_with_jitter(&a, 1e-6).unwrap();
        assert!(ridge > 0.0);
    }
}
