//! CART decision tree

use crate::error::{DecisionError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node.
    ///
    /// `values` holds class proportions for classifiers (indexed like
    /// [`DecisionTree::classes`]) and the single mean for regressors.
    Leaf {
        values: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    /// Leaf reached by `sample`
    pub fn leaf_for(&self, sample: &[f64]) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { values, .. } => return values,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Running statistics of the samples on one side of a candidate split
#[derive(Debug, Clone)]
struct SideStats {
    counts: Vec<f64>,
    n: f64,
    sum: f64,
    sq_sum: f64,
}

impl SideStats {
    fn new(n_classes: usize) -> Self {
        Self {
            counts: vec![0.0; n_classes],
            n: 0.0,
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, target: f64, class_idx: Option<usize>) {
        if let Some(c) = class_idx {
            self.counts[c] += 1.0;
        }
        self.n += 1.0;
        self.sum += target;
        self.sq_sum += target * target;
    }

    fn remove(&mut self, target: f64, class_idx: Option<usize>) {
        if let Some(c) = class_idx {
            self.counts[c] -= 1.0;
        }
        self.n -= 1.0;
        self.sum -= target;
        self.sq_sum -= target * target;
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => 1.0 - self.counts.iter().map(|c| (c / self.n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -self
                .counts
                .iter()
                .filter(|c| **c > 0.0)
                .map(|c| {
                    let p = c / self.n;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => (self.sq_sum / self.n - (self.sum / self.n).powi(2)).max(0.0),
        }
    }
}

/// State threaded through recursive tree construction
struct BuildContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    class_idx: Vec<Option<usize>>,
    importances: Vec<f64>,
    rng: ChaCha8Rng,
}

/// Decision tree model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth (root has depth 0)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled per split; all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let classes = if self.is_classification {
            unique_sorted(y)
        } else {
            Vec::new()
        };
        self.fit_with_classes(x, y, &classes)
    }

    /// Fit against a declared class list.
    ///
    /// Forests use this so every tree shares the same class indexing even
    /// when a bootstrap sample misses a class.
    pub fn fit_with_classes(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        classes: &[f64],
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(DecisionError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(DecisionError::ValidationError(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        self.classes = if self.is_classification { classes.to_vec() } else { Vec::new() };

        let class_idx = if self.is_classification {
            y.iter()
                .map(|label| {
                    self.classes
                        .iter()
                        .position(|c| c == label)
                        .map(Some)
                        .ok_or_else(|| {
                            DecisionError::ValidationError(format!("label {} not in class list", label))
                        })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![None; n_samples]
        };

        let mut ctx = BuildContext {
            x,
            y,
            class_idx,
            importances: vec![0.0; n_features],
            rng: ChaCha8Rng::seed_from_u64(self.random_state),
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(&mut ctx, &indices, 0);

        let mut importances = ctx.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn node_stats(&self, ctx: &BuildContext, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::new(self.classes.len());
        for &i in indices {
            stats.add(ctx.y[i], ctx.class_idx[i]);
        }
        stats
    }

    fn leaf(&self, stats: &SideStats) -> TreeNode {
        let values = if self.is_classification {
            stats.counts.iter().map(|c| c / stats.n.max(1.0)).collect()
        } else {
            vec![stats.sum / stats.n.max(1.0)]
        };
        TreeNode::Leaf {
            values,
            n_samples: stats.n as usize,
        }
    }

    fn build_tree(&self, ctx: &mut BuildContext, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(ctx, indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats);
        }

        let candidates: Vec<usize> = match self.max_features {
            Some(k) if k < self.n_features => {
                rand::seq::index::sample(&mut ctx.rng, self.n_features, k).into_vec()
            }
            _ => (0..self.n_features).collect(),
        };

        let best = self.find_best_split(ctx, indices, &stats, impurity, &candidates);
        let (feature_idx, threshold, weighted_child_impurity) = match best {
            Some(split) => split,
            None => return self.leaf(&stats),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, feature_idx]] <= threshold);

        ctx.importances[feature_idx] += n_samples as f64 * (impurity - weighted_child_impurity);

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Best `(feature, threshold, weighted child impurity)` over the
    /// candidate features, scanning each feature's sorted values once.
    fn find_best_split(
        &self,
        ctx: &BuildContext,
        indices: &[usize],
        parent: &SideStats,
        parent_impurity: f64,
        candidates: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;

        candidates
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    ctx.x[[a, feature_idx]]
                        .partial_cmp(&ctx.x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = SideStats::new(self.classes.len());
                let mut right = parent.clone();
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    left.add(ctx.y[i], ctx.class_idx[i]);
                    right.remove(ctx.y[i], ctx.class_idx[i]);

                    let value = ctx.x[[i, feature_idx]];
                    let next = ctx.x[[order[pos + 1], feature_idx]];
                    if next <= value {
                        continue;
                    }
                    if (left.n as usize) < self.min_samples_leaf
                        || (right.n as usize) < self.min_samples_leaf
                    {
                        continue;
                    }

                    let weighted = (left.n * left.impurity(self.criterion)
                        + right.n * right.impurity(self.criterion))
                        / n;
                    if best.map_or(true, |(w, _)| weighted < w) {
                        let mut threshold = (value + next) / 2.0;
                        if threshold >= next {
                            threshold = value;
                        }
                        best = Some((weighted, threshold));
                    }
                }

                best.filter(|(w, _)| parent_impurity - w > 1e-12)
                    .map(|(w, t)| (feature_idx, t, w))
            })
            .collect::<Vec<_>>()
            .into_iter()
            // ties resolve to the lowest feature index so fits are reproducible
            .min_by(|a, b| {
                a.2.partial_cmp(&b.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            })
    }

    fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(DecisionError::NotTrained)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(DecisionError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Predicted class label or regression value per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        self.check_width(x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let sample = row.to_vec();
                let values = root.leaf_for(&sample);
                if self.is_classification {
                    argmax(values).map(|c| self.classes[c]).unwrap_or(0.0)
                } else {
                    values[0]
                }
            })
            .collect())
    }

    /// Class proportions of the reached leaf, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root()?;
        self.check_width(x)?;
        if !self.is_classification {
            return Err(DecisionError::ValidationError(
                "predict_proba is only available for classification".to_string(),
            ));
        }

        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            for (j, p) in root.leaf_for(&sample).iter().enumerate() {
                proba[[i, j]] = *p;
            }
        }
        Ok(proba)
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    /// Fitted root node, for tree-walking explainers
    pub fn root_node(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalised impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

/// Sorted distinct values of a label vector
pub(crate) fn unique_sorted(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

/// Index of the largest value; first one wins on ties
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        // depth counts levels, so a depth-2 limit allows 3 levels of nodes
        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_unfitted_tree() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(DecisionError::NotTrained)));
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.2, 0.7, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
