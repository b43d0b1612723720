//! Gradient boosted regression trees
//!
//! Squared-error boosting: each round fits a regression tree to the
//! current residuals and adds its (shrunken) predictions to the
//! ensemble. Row and column subsampling are supported but default to
//! using everything.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::RegressionTree;
use crate::error::Result;

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Row fraction drawn per tree
    pub subsample: f64,
    /// Column fraction drawn per tree
    pub colsample_bytree: f64,
    /// Seed for the row/column sampler
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<RegressionTree>,
    columns_per_tree: Vec<Vec<usize>>,
    base_prediction: f64,
    feature_importances: Vec<f64>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            columns_per_tree: Vec::new(),
            base_prediction: 0.0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the ensemble to training data.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.trees.clear();
        self.columns_per_tree.clear();
        self.base_prediction = y.mean().unwrap_or(0.0);
        self.feature_importances = vec![0.0; n_features];

        let mut predictions = Array1::from_elem(n_samples, self.base_prediction);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, pi)| yi - pi)
                .collect();

            let rows = sample_indices(n_samples, self.config.subsample, &mut rng);
            let columns = sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_sub = x
                .select(ndarray::Axis(0), &rows)
                .select(ndarray::Axis(1), &columns);
            let r_sub: Array1<f64> = rows.iter().map(|&i| residuals[i]).collect();

            let mut tree = RegressionTree::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            // update predictions for every row, not just the sampled ones
            let x_cols = x.select(ndarray::Axis(1), &columns);
            let tree_pred = tree.predict(&x_cols)?;
            for i in 0..n_samples {
                predictions[i] += self.config.learning_rate * tree_pred[i];
            }

            if let Some(tree_importance) = tree.feature_importances() {
                for (local, &global) in columns.iter().enumerate() {
                    self.feature_importances[global] += tree_importance[local];
                }
            }

            self.trees.push(tree);
            self.columns_per_tree.push(columns);

            if (round + 1) % 25 == 0 {
                let mse = residuals.iter().map(|r| r * r).sum::<f64>() / n_samples as f64;
                debug!(round = round + 1, train_mse = mse, "boosting progress");
            }
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict by summing the shrunken tree outputs over the base.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n = x.nrows();
        let mut predictions = Array1::from_elem(n, self.base_prediction);

        for (tree, columns) in self.trees.iter().zip(self.columns_per_tree.iter()) {
            let x_sub = x.select(ndarray::Axis(1), columns);
            let tree_pred = tree.predict(&x_sub)?;
            for i in 0..n {
                predictions[i] += self.config.learning_rate * tree_pred[i];
            }
        }

        Ok(predictions)
    }

    /// Normalized per-feature importance accumulated over all trees
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Draw `fraction` of `0..n` without replacement, sorted ascending.
/// A fraction of 1.0 returns every index in order.
fn sample_indices(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n).collect();
    }
    let size = ((n as f64) * fraction).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(size.max(1));
    indices.sort_unstable();
    indices
}
