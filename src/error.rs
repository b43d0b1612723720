//! Error types for the cinescore pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cinescore operations
pub type Result<T> = std::result::Result<T, CineScoreError>;

/// Main error type for the cinescore pipeline
#[derive(Error, Debug)]
pub enum CineScoreError {
    #[error("Decoding error: no candidate encoding could decode {}", .path.display())]
    DecodingError { path: PathBuf },

    #[error("Missing input file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Schema contract violation at stage '{stage}': missing column {column}")]
    ContractViolation { stage: String, column: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Chart rendering error: {0}")]
    ChartError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for CineScoreError {
    fn from(err: polars::error::PolarsError) -> Self {
        CineScoreError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CineScoreError {
    fn from(err: serde_json::Error) -> Self {
        CineScoreError::SerializationError(err.to_string())
    }
}
