//! K-fold cross-validation

use crate::error::{CineScoreError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter over contiguous index ranges. Callers that want a
/// shuffled evaluation randomize their row order before splitting, as
/// the predictor's train/test split does.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Generate the folds. Every index lands in exactly one test set.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(CineScoreError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(CineScoreError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let indices: Vec<usize> = (0..n_samples).collect();
        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut current = 0;

        for fold_idx in 0..self.n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
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
}

/// Cross-validation summary across folds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores
            .iter()
            .map(|s| (s - mean_score).powi(2))
            .sum::<f64>()
            / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// K-fold RMSE for a boosting configuration: each fold trains a fresh
/// model on the other folds and scores the held-out one.
pub fn cross_val_rmse(
    config: &GradientBoostingConfig,
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_splits: usize,
) -> Result<CVResults> {
    let splits = KFold::new(n_splits).split(x.nrows())?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = x.select(ndarray::Axis(0), &split.train_indices);
        let y_train: Array1<f64> = split.train_indices.iter().map(|&i| y[i]).collect();
        let x_test = x.select(ndarray::Axis(0), &split.test_indices);
        let y_test: Array1<f64> = split.test_indices.iter().map(|&i| y[i]).collect();

        let mut model = GradientBoostingRegressor::new(config.clone());
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;

        let mse = y_test
            .iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>()
            / y_test.len() as f64;
        scores.push(mse.sqrt());
        debug!(fold = split.fold_idx, rmse = mse.sqrt(), "fold scored");
    }

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_the_indices() {
        let splits = KFold::new(5).split(100).unwrap();
        assert_eq!(splits.len(), 5);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits
            .iter()
            .flat_map(|s| s.test_indices.clone())
            .collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_uneven_fold_sizes() {
        let splits = KFold::new(3).split(10).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_too_few_samples_is_rejected() {
        assert!(KFold::new(5).split(3).is_err());
    }

    #[test]
    fn test_cross_val_rmse_on_noiseless_data() {
        let x = Array2::from_shape_vec((30, 1), (0..30).map(|i| i as f64).collect()).unwrap();
        let y: Array1<f64> = x.rows().into_iter().map(|row| row[0] * 2.0).collect();

        let config = GradientBoostingConfig {
            n_estimators: 30,
            max_depth: 3,
            ..Default::default()
        };
        let results = cross_val_rmse(&config, &x, &y, 5).unwrap();

        assert_eq!(results.n_folds, 5);
        assert!(results.mean_score.is_finite());
        assert!(results.std_score >= 0.0);
    }
}
