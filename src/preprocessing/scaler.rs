//! Z-score feature scaling

use crate::error::{CineScoreError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for one fitted column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnStats {
    mean: f64,
    std: f64,
}

/// Standardizes numeric columns to zero mean and unit variance.
/// Uses the population standard deviation; a zero-variance column
/// keeps a scale of 1.0 so its values map to 0 instead of NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    stats: HashMap<String, ColumnStats>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            stats: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler on the named columns.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.stats.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| CineScoreError::FeatureNotFound(col_name.to_string()))?;
            let cast = column.as_materialized_series().cast(&DataType::Float64)?;
            let ca = cast.f64()?;

            let mean = ca.mean().unwrap_or(0.0);
            let std = ca.std(0).unwrap_or(1.0);
            self.stats.insert(
                col_name.to_string(),
                ColumnStats {
                    mean,
                    std: if std == 0.0 { 1.0 } else { std },
                },
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Standardize the fitted columns. Builds all replacement columns
    /// first, then applies them in a single pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .stats
            .iter()
            .filter_map(|(col_name, stats)| {
                df.column(col_name).ok().map(|column| {
                    let cast = column.as_materialized_series().cast(&DataType::Float64)?;
                    let scaled: Float64Chunked = cast
                        .f64()?
                        .into_iter()
                        .map(|opt| opt.map(|v| (v - stats.mean) / stats.std))
                        .collect();
                    Ok(scaled.with_name(col_name.as_str().into()).into_series())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result = result
                .with_column(scaled)
                .map_err(|e| CineScoreError::DataError(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
