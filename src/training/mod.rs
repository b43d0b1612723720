//! Model training module
//!
//! Gradient boosted regression trees plus the surrounding machinery:
//! train/test partitioning, k-fold cross-validation, evaluation
//! metrics, and model persistence.

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod metrics;
pub mod predictor;

pub use cross_validation::{cross_val_rmse, CVResults, CVSplit, KFold};
pub use decision_tree::RegressionTree;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use metrics::RegressionMetrics;
pub use predictor::{
    columns_to_array2, DatasetSplit, EvaluationReport, PredictorConfig, RatingPredictor,
};
