//! Regression tree grown by variance reduction

use crate::error::{CineScoreError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Single regression tree, used as the base learner for boosting.
/// Splits minimize within-node variance; leaves predict the mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(CineScoreError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(CineScoreError::ValidationError(
                "cannot fit a tree on an empty dataset".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        let at_depth_limit = self.max_depth.is_some_and(|d| depth >= d);
        if n_samples < self.min_samples_split || at_depth_limit {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        }

        let Some((feature, threshold, gain)) = self.find_best_split(x, y, indices) else {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_node(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_node(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Best (feature, threshold, variance gain) over all features.
    /// Each feature sorts its values once and sweeps split positions
    /// with running sums; features are scanned in parallel.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = total_sq / n - (total_sum / n).powi(2);

        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature| {
                let mut pairs: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (x[[i, feature]], y[i]))
                    .collect();
                pairs.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left_sum = 0.0f64;
                let mut left_sq = 0.0f64;
                let mut best: Option<(f64, f64)> = None;

                for split in 1..pairs.len() {
                    let (prev_value, prev_y) = pairs[split - 1];
                    left_sum += prev_y;
                    left_sq += prev_y * prev_y;

                    // identical values cannot be separated
                    if pairs[split].0 <= prev_value {
                        continue;
                    }

                    let left_n = split;
                    let right_n = pairs.len() - split;
                    if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let left_impurity =
                        left_sq / left_n as f64 - (left_sum / left_n as f64).powi(2);
                    let right_impurity =
                        right_sq / right_n as f64 - (right_sum / right_n as f64).powi(2);

                    let weighted =
                        (left_n as f64 * left_impurity + right_n as f64 * right_impurity) / n;
                    let gain = parent_impurity - weighted;

                    if best.map_or(true, |(g, _)| gain > g) {
                        let threshold = (prev_value + pairs[split].0) / 2.0;
                        best = Some((gain, threshold));
                    }
                }

                best.filter(|&(gain, _)| gain > 1e-12)
                    .map(|(gain, threshold)| (feature, threshold, gain))
            })
            .collect();

        candidates
            .into_iter()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(CineScoreError::ModelNotFitted)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if x[[i, *feature]] <= *threshold {
                                left
                            } else {
                                right
                            };
                        }
                    }
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Per-feature share of total variance reduction, summing to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the fitted tree (leaves count as one level)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 8.0, 8.0, 8.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert!((p - a).abs() < 1e-10);
        }
    }

    #[test]
    fn test_max_depth_is_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = RegressionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        // root level + one split level
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_feature_gets_zero_importance() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 1.0, 2.0, 2.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > 0.9);
        assert!(importances[1] < 1e-10);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let tree = RegressionTree::new();
        let x = array![[1.0]];
        assert!(matches!(
            tree.predict(&x),
            Err(CineScoreError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_min_samples_leaf_limits_splits() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut tree = RegressionTree::new().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        // leaves hold at least two samples, so predictions are pair means
        assert!((predictions[0] - 1.5).abs() < 1e-10);
        assert!((predictions[3] - 3.5).abs() < 1e-10);
    }
}
