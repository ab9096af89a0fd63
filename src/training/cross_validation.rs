//! Cross-validation and hold-out splitting

use crate::error::{DecisionError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(n_samples, *n_splits, *shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    DecisionError::ValidationError("StratifiedKFold requires target array".to_string())
                })?;
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check_splits(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(DecisionError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(DecisionError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_splits(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.random_state));
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        Self::check_splits(y.len(), n_splits)?;

        let mut class_indices = group_by_class(y);
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // deal each class round-robin so folds keep the class mix
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect())
    }
}

/// Row indices per class label, keyed by the label rounded to an integer
/// so the iteration order is deterministic.
fn group_by_class(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        class_indices.entry(val.round() as i64).or_default().push(idx);
    }
    class_indices
}

/// Shuffled hold-out split returning `(train, validation)` row indices.
///
/// When `stratify` is set and every class has at least two rows, each class
/// contributes its own share to the validation set; otherwise the split is
/// a plain shuffle. Both sides are non-empty whenever `n >= 2`.
pub fn train_validation_split(
    y: &Array1<f64>,
    validation_fraction: f64,
    stratify: bool,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let n = y.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    if n < 2 || validation_fraction <= 0.0 {
        return ((0..n).collect(), Vec::new());
    }
    let n_val = ((n as f64 * validation_fraction).ceil() as usize).clamp(1, n - 1);

    let groups = group_by_class(y);
    let can_stratify = stratify && groups.len() > 1 && groups.values().all(|g| g.len() >= 2);

    let (mut train, mut val) = (Vec::with_capacity(n - n_val), Vec::with_capacity(n_val));
    if can_stratify {
        for indices in groups.into_values() {
            let mut indices = indices;
            indices.shuffle(&mut rng);
            let share = ((indices.len() as f64 * validation_fraction).round() as usize)
                .clamp(1, indices.len() - 1);
            val.extend_from_slice(&indices[..share]);
            train.extend_from_slice(&indices[share..]);
        }
        train.shuffle(&mut rng);
        val.shuffle(&mut rng);
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        val.extend_from_slice(&indices[..n_val]);
        train.extend_from_slice(&indices[n_val..]);
    }

    (train, val)
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds.max(1) as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds.max(1) as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(3, None).is_err());
    }

    #[test]
    fn test_stratified_holdout_keeps_both_classes() {
        let y = Array1::from_shape_fn(50, |i| if i < 40 { 0.0 } else { 1.0 });
        let (train, val) = train_validation_split(&y, 0.2, true, 42);

        assert_eq!(train.len() + val.len(), 50);
        assert_eq!(val.iter().filter(|&&i| y[i] == 1.0).count(), 2);
        assert_eq!(val.iter().filter(|&&i| y[i] == 0.0).count(), 8);
    }

    #[test]
    fn test_holdout_is_deterministic() {
        let y = Array1::from_shape_fn(30, |i| (i % 3) as f64);
        assert_eq!(
            train_validation_split(&y, 0.3, true, 7),
            train_validation_split(&y, 0.3, true, 7)
        );
        let (train, val) = train_validation_split(&Array1::from_vec(vec![1.0]), 0.5, true, 7);
        assert_eq!((train.len(), val.len()), (1, 0));
    }
}
