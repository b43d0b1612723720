//! Missing value imputation

use crate::error::{CineScoreError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback label when a categorical column has no observed mode.
const UNKNOWN_CATEGORY: &str = "Unknown";

/// Fills missing values with column statistics learned at fit time:
/// the mean for numeric columns, the most frequent value for string
/// columns. Columns of any other dtype are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    numeric_fill: HashMap<String, f64>,
    categorical_fill: HashMap<String, String>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new() -> Self {
        Self {
            numeric_fill: HashMap::new(),
            categorical_fill: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fitted mean for a numeric column, if the column was seen at fit
    /// time.
    pub fn numeric_fill(&self, column: &str) -> Option<f64> {
        self.numeric_fill.get(column).copied()
    }

    /// Learn fill values from every numeric and string column.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.numeric_fill.clear();
        self.categorical_fill.clear();

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            match series.dtype() {
                DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 => {
                    let cast = series.cast(&DataType::Float64)?;
                    let mean = cast.f64()?.mean().unwrap_or(0.0);
                    self.numeric_fill.insert(col.name().to_string(), mean);
                }
                DataType::String => {
                    let mode = column_mode(series.str()?)
                        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                    self.categorical_fill.insert(col.name().to_string(), mode);
                }
                _ => {}
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Fill nulls using the fitted statistics. Builds the replacement
    /// columns first, then applies them in a single pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }

        let mut replacements: Vec<Series> = Vec::new();

        for (col_name, fill) in &self.numeric_fill {
            let Ok(column) = df.column(col_name) else {
                continue;
            };
            let cast = column.as_materialized_series().cast(&DataType::Float64)?;
            let filled: Float64Chunked = cast
                .f64()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(*fill)))
                .collect();
            replacements.push(filled.with_name(col_name.as_str().into()).into_series());
        }

        for (col_name, fill) in &self.categorical_fill {
            let Ok(column) = df.column(col_name) else {
                continue;
            };
            let filled: StringChunked = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(fill.as_str()).to_string()))
                .collect();
            replacements.push(filled.with_name(col_name.as_str().into()).into_series());
        }

        let mut result = df.clone();
        for filled in replacements {
            result = result
                .with_column(filled)
                .map_err(|e| CineScoreError::DataError(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Most frequent non-null value. Ties resolve to whichever value first
/// reached the winning count in row order.
fn column_mode(ca: &StringChunked) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut best: Option<(&str, usize)> = None;

    for value in ca.into_iter().flatten() {
        let count = counts.entry(value).or_insert(0);
        *count += 1;
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((value, *count)),
        }
    }

    best.map(|(value, _)| value.to_string())
}
