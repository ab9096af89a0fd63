//! Exact path-dependent TreeSHAP
//!
//! Polynomial-time Shapley values for a single tree, using node sample
//! counts as the conditional coverage. For an instance `x` the result
//! satisfies `expected_value + sum(phi) == leaf_value(x)`.

use crate::training::{DecisionTree, TreeNode};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    // weights stay in place; only the feature records shift down
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total weight the path would carry with element `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64;
        }
    } else if zero_fraction != 0.0 {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero_fraction * (depth - i) as f64);
        }
    }
    total * (depth + 1) as f64
}

struct Walk<'a> {
    x: &'a [f64],
    output: usize,
    phi: &'a mut [f64],
}

impl Walk<'_> {
    fn recurse(
        &mut self,
        node: &TreeNode,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        match node {
            TreeNode::Leaf { values, .. } => {
                let leaf_value = values.get(self.output).copied().unwrap_or(0.0);
                for i in 1..path.len() {
                    let w = unwound_path_sum(&path, i);
                    let el = path[i];
                    if let Some(f) = el.feature {
                        self.phi[f] += w * (el.one_fraction - el.zero_fraction) * leaf_value;
                    }
                }
            }
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                n_samples,
                ..
            } => {
                let (hot, cold) = if self.x[*feature_idx] <= *threshold {
                    (left, right)
                } else {
                    (right, left)
                };
                let cover = (*n_samples).max(1) as f64;
                let hot_zero = hot.n_samples() as f64 / cover;
                let cold_zero = cold.n_samples() as f64 / cover;

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = path.iter().position(|el| el.feature == Some(*feature_idx)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                self.recurse(hot, &path, hot_zero * incoming_zero, incoming_one, Some(*feature_idx));
                self.recurse(cold, &path, cold_zero * incoming_zero, 0.0, Some(*feature_idx));
            }
        }
    }
}

/// Shapley values of output column `output` for one tree and one instance
pub fn tree_shap(tree: &DecisionTree, x: &[f64], output: usize) -> Vec<f64> {
    let mut phi = vec![0.0; x.len()];
    if let Some(root) = tree.root_node() {
        let mut walk = Walk {
            x,
            output,
            phi: &mut phi,
        };
        walk.recurse(root, &[], 1.0, 1.0, None);
    }
    phi
}

/// Coverage-weighted mean leaf value of output column `output`
pub fn tree_expected_value(tree: &DecisionTree, output: usize) -> f64 {
    fn walk(node: &TreeNode, output: usize) -> f64 {
        match node {
            TreeNode::Leaf { values, .. } => values.get(output).copied().unwrap_or(0.0),
            TreeNode::Split { left, right, n_samples, .. } => {
                let n = (*n_samples).max(1) as f64;
                (left.n_samples() as f64 * walk(left, output)
                    + right.n_samples() as f64 * walk(right, output))
                    / n
            }
        }
    }
    tree.root_node().map_or(0.0, |root| walk(root, output))
}
