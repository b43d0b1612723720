//! CineScore - movie rating prediction
//!
//! A batch pipeline that turns a raw movie CSV into a trained
//! gradient-boosted rating model:
//! - [`loader`] - CSV loading with character-encoding recovery
//! - [`cleaning`] - duplicate removal and column typing
//! - [`preprocessing`] - imputation, target encoding, scaling
//! - [`feature_engineering`] - grouped statistics and temporal features
//! - [`training`] - boosted trees, cross-validation, persistence
//! - [`pipeline`] - stage orchestration with schema contracts
//! - [`visualization`] - feature-importance chart
//! - [`cli`] - command-line interface

pub mod error;

pub mod cleaning;
pub mod feature_engineering;
pub mod loader;
pub mod pipeline;
pub mod preprocessing;
pub mod training;
pub mod visualization;

pub mod cli;

pub use error::{CineScoreError, Result};

/// Common imports for working with the pipeline
pub mod prelude {
    pub use crate::cleaning::DataCleaner;
    pub use crate::error::{CineScoreError, Result};
    pub use crate::feature_engineering::FeatureEngineer;
    pub use crate::loader::TableLoader;
    pub use crate::pipeline::{
        PipelineConfig, PipelineReport, RatingPipeline, StageContract, TransformerState,
    };
    pub use crate::preprocessing::{Imputer, StandardScaler, TargetEncoder};
    pub use crate::training::{
        GradientBoostingConfig, GradientBoostingRegressor, PredictorConfig, RatingPredictor,
        RegressionMetrics,
    };
}
