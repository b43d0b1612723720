//! Preprocessing stages: imputation, target encoding, and scaling
//!
//! Each stage is a stateful transformer with the same lifecycle:
//! `fit` learns parameters from the training table, `transform`
//! applies them to any table with the same columns, and the fitted
//! state serializes so a persisted pipeline can be reapplied later.

pub mod encoder;
pub mod imputer;
pub mod scaler;

pub use encoder::TargetEncoder;
pub use imputer::Imputer;
pub use scaler::StandardScaler;

use polars::prelude::*;

/// Names of the numeric columns in the frame, minus any excluded.
pub fn numeric_column_names(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| {
            matches!(
                col.dtype(),
                DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
            )
        })
        .map(|col| col.name().to_string())
        .filter(|name| !exclude.contains(&name.as_str()))
        .collect()
}

/// Names of the string-typed columns in the frame, minus any excluded.
pub fn string_column_names(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.dtype() == &DataType::String)
        .map(|col| col.name().to_string())
        .filter(|name| !exclude.contains(&name.as_str()))
        .collect()
}
