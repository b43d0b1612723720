//! Rating prediction model
//!
//! Owns the boosted ensemble plus everything needed to reuse it:
//! feature-column order, train/test partitioning, evaluation, and
//! JSON persistence.

use crate::error::{CineScoreError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::cross_validation::{cross_val_rmse, CVResults};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::metrics::RegressionMetrics;

/// Everything configurable about a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Column to predict
    pub target_column: String,
    /// Columns dropped before feature extraction
    pub drop_columns: Vec<String>,
    /// Held-out fraction for evaluation
    pub test_size: f64,
    /// Seed for the train/test shuffle
    pub random_state: u64,
    /// Folds for the cross-validated RMSE estimate
    pub cv_folds: usize,
    /// Ensemble hyperparameters
    pub boosting: GradientBoostingConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            target_column: "rating".to_string(),
            drop_columns: vec!["title".to_string(), "release_date".to_string()],
            test_size: 0.2,
            random_state: 42,
            cv_folds: 5,
            boosting: GradientBoostingConfig::default(),
        }
    }
}

/// Train/test partition in matrix form
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// Evaluation output: held-out metrics plus a k-fold RMSE estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: RegressionMetrics,
    pub cv_rmse: Option<CVResults>,
}

/// Gradient-boosted rating predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingPredictor {
    config: PredictorConfig,
    model: GradientBoostingRegressor,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl RatingPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        let model = GradientBoostingRegressor::new(config.boosting.clone());
        Self {
            config,
            model,
            feature_names: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Split the engineered table into shuffled train/test matrices.
    /// Also fixes the feature-column order used by later predictions.
    pub fn prepare_data(&mut self, df: &DataFrame) -> Result<DatasetSplit> {
        let mut df = df.clone();
        for col in &self.config.drop_columns {
            if df.column(col).is_ok() {
                df = df.drop(col)?;
            }
        }

        let feature_cols: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != self.config.target_column)
            .map(|s| s.to_string())
            .collect();
        if feature_cols.is_empty() {
            return Err(CineScoreError::ValidationError(
                "no feature columns left after dropping".to_string(),
            ));
        }
        self.feature_names = feature_cols.clone();

        let x = columns_to_array2(&df, &feature_cols)?;
        let y = target_to_array1(&df, &self.config.target_column)?;

        let n = x.nrows();
        let test_count = ((n as f64) * self.config.test_size).ceil() as usize;
        if test_count == 0 || test_count >= n {
            return Err(CineScoreError::ValidationError(format!(
                "test_size {} leaves an empty partition for {} rows",
                self.config.test_size, n
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);
        let (test_idx, train_idx) = indices.split_at(test_count);

        info!(
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            features = feature_cols.len(),
            "dataset partitioned"
        );

        Ok(DatasetSplit {
            x_train: x.select(ndarray::Axis(0), train_idx),
            y_train: train_idx.iter().map(|&i| y[i]).collect(),
            x_test: x.select(ndarray::Axis(0), test_idx),
            y_test: test_idx.iter().map(|&i| y[i]).collect(),
        })
    }

    /// Fit the ensemble on the training partition.
    pub fn train(&mut self, split: &DatasetSplit) -> Result<()> {
        self.model.fit(&split.x_train, &split.y_train)?;
        self.is_fitted = true;
        Ok(())
    }

    /// Score the held-out partition and estimate RMSE spread with
    /// k-fold cross-validation over that same partition. The CV
    /// estimate is skipped when the partition has fewer rows than
    /// folds.
    pub fn evaluate(&self, split: &DatasetSplit) -> Result<EvaluationReport> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }

        let predictions = self.model.predict(&split.x_test)?;
        let metrics = RegressionMetrics::compute(&split.y_test, &predictions);

        let cv_rmse = if split.x_test.nrows() >= self.config.cv_folds {
            Some(cross_val_rmse(
                &self.config.boosting,
                &split.x_test,
                &split.y_test,
                self.config.cv_folds,
            )?)
        } else {
            warn!(
                rows = split.x_test.nrows(),
                folds = self.config.cv_folds,
                "test partition too small for cross-validation"
            );
            None
        };

        Ok(EvaluationReport { metrics, cv_rmse })
    }

    /// Predict ratings for an engineered table with the same columns.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }
        let x = columns_to_array2(df, &self.feature_names)?;
        self.predict_matrix(&x)
    }

    /// Predict from an already-extracted feature matrix.
    pub fn predict_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }
        self.model.predict(x)
    }

    /// Feature names paired with importance, most important first.
    pub fn feature_importance_pairs(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.model.feature_importances().iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }

    /// Save the fitted predictor to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a predictor from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let predictor: Self = serde_json::from_str(&json)?;
        Ok(predictor)
    }
}

/// Extract named columns into a row-major matrix; nulls become 0.0.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| CineScoreError::FeatureNotFound(col_name.clone()))?;
            let cast = column.as_materialized_series().cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(i, j)| {
        col_data[j][i]
    }))
}

fn target_to_array1(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let column = df
        .column(target)
        .map_err(|_| CineScoreError::FeatureNotFound(target.to_string()))?;
    let cast = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(rows: usize) -> DataFrame {
        let ratings: Vec<f64> = (0..rows).map(|i| 5.0 + (i % 5) as f64 * 0.5).collect();
        let votes: Vec<f64> = (0..rows).map(|i| i as f64 * 10.0).collect();
        let encoded: Vec<f64> = (0..rows).map(|i| (i % 3) as f64).collect();
        let titles: Vec<String> = (0..rows).map(|i| format!("movie {}", i)).collect();

        df! {
            "title" => titles,
            "rating" => ratings,
            "Votes" => votes,
            "director_encoded" => encoded,
        }
        .unwrap()
    }

    #[test]
    fn test_split_partitions_are_disjoint_and_complete() {
        let df = sample_frame(50);
        let mut predictor = RatingPredictor::new(PredictorConfig::default());
        let split = predictor.prepare_data(&df).unwrap();

        assert_eq!(split.x_train.nrows() + split.x_test.nrows(), 50);
        assert_eq!(split.x_test.nrows(), 10);
        assert_eq!(split.y_train.len(), 40);
    }

    #[test]
    fn test_dropped_columns_are_not_features() {
        let df = sample_frame(20);
        let mut predictor = RatingPredictor::new(PredictorConfig::default());
        predictor.prepare_data(&df).unwrap();

        let names: Vec<&str> = predictor.feature_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Votes", "director_encoded"]);
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let df = sample_frame(30);
        let mut a = RatingPredictor::new(PredictorConfig::default());
        let mut b = RatingPredictor::new(PredictorConfig::default());

        let sa = a.prepare_data(&df).unwrap();
        let sb = b.prepare_data(&df).unwrap();
        assert_eq!(sa.y_test.to_vec(), sb.y_test.to_vec());
    }

    #[test]
    fn test_train_evaluate_produces_finite_metrics() {
        let df = sample_frame(60);
        let config = PredictorConfig {
            boosting: GradientBoostingConfig {
                n_estimators: 15,
                max_depth: 3,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut predictor = RatingPredictor::new(config);
        let split = predictor.prepare_data(&df).unwrap();
        predictor.train(&split).unwrap();
        let report = predictor.evaluate(&split).unwrap();

        assert!(report.metrics.rmse.is_finite());
        assert!(report.cv_rmse.is_some());
    }

    #[test]
    fn test_small_test_partition_skips_cv() {
        let df = sample_frame(10);
        let config = PredictorConfig {
            boosting: GradientBoostingConfig {
                n_estimators: 5,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut predictor = RatingPredictor::new(config);
        let split = predictor.prepare_data(&df).unwrap();
        predictor.train(&split).unwrap();
        let report = predictor.evaluate(&split).unwrap();

        // 2 test rows cannot fill 5 folds
        assert!(report.cv_rmse.is_none());
    }

    #[test]
    fn test_save_load_round_trip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let df = sample_frame(40);
        let config = PredictorConfig {
            boosting: GradientBoostingConfig {
                n_estimators: 10,
                max_depth: 3,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut predictor = RatingPredictor::new(config);
        let split = predictor.prepare_data(&df).unwrap();
        predictor.train(&split).unwrap();
        predictor.save(&path).unwrap();

        let restored = RatingPredictor::load(&path).unwrap();
        let original = predictor.predict_matrix(&split.x_test).unwrap();
        let reloaded = restored.predict_matrix(&split.x_test).unwrap();
        for (a, b) in original.iter().zip(reloaded.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_importances_are_sorted_descending() {
        let df = sample_frame(40);
        let config = PredictorConfig {
            boosting: GradientBoostingConfig {
                n_estimators: 10,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut predictor = RatingPredictor::new(config);
        let split = predictor.prepare_data(&df).unwrap();
        predictor.train(&split).unwrap();

        let pairs = predictor.feature_importance_pairs();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].1 >= pairs[1].1);
    }
}
