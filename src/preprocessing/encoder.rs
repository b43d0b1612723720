//! Target encoding for high-cardinality categorical columns

use crate::error::{CineScoreError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Replaces each categorical column with a numeric `<name>_encoded`
/// column holding the smoothed mean of the target per category.
///
/// Smoothing blends the category mean with the global target mean,
/// weighted by a sigmoid of the category count, so rare categories
/// stay close to the global mean. Unseen categories at transform time
/// map to the global mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEncoder {
    columns: Vec<String>,
    mappings: HashMap<String, HashMap<String, f64>>,
    global_mean: f64,
    is_fitted: bool,
}

impl TargetEncoder {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            mappings: HashMap::new(),
            global_mean: 0.0,
            is_fitted: false,
        }
    }

    /// Columns this encoder was configured with, whether or not they
    /// were present at fit time.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Global target mean learned at fit time.
    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Learn the per-category encodings from the target column.
    /// Configured columns absent from the frame are skipped.
    pub fn fit(&mut self, df: &DataFrame, target: &str) -> Result<&mut Self> {
        let target_col = df
            .column(target)
            .map_err(|_| CineScoreError::FeatureNotFound(target.to_string()))?;
        let target_ca = target_col
            .as_materialized_series()
            .cast(&DataType::Float64)?
            .f64()?
            .clone();

        self.global_mean = target_ca.mean().unwrap_or(0.0);
        self.mappings.clear();

        for col_name in &self.columns {
            let Ok(column) = df.column(col_name) else {
                continue;
            };
            let ca = column.as_materialized_series().str()?.clone();

            let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
            for (category, value) in ca.into_iter().zip(target_ca.into_iter()) {
                let (Some(category), Some(value)) = (category, value) else {
                    continue;
                };
                let entry = sums.entry(category.to_string()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }

            let mapping: HashMap<String, f64> = sums
                .into_iter()
                .map(|(category, (sum, count))| {
                    let mean = sum / count as f64;
                    let weight = 1.0 / (1.0 + (-(count as f64 - 1.0)).exp());
                    let encoded = self.global_mean * (1.0 - weight) + mean * weight;
                    (category, encoded)
                })
                .collect();

            self.mappings.insert(col_name.clone(), mapping);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column with its `<name>_encoded` version.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CineScoreError::ModelNotFitted);
        }

        let mut result = df.clone();

        // Walk the configured column order, not the mapping table, so
        // the encoded columns land in the same order on every run.
        for col_name in &self.columns {
            let Some(mapping) = self.mappings.get(col_name) else {
                continue;
            };
            let Ok(column) = result.column(col_name) else {
                continue;
            };
            let ca = column.as_materialized_series().str()?.clone();

            let encoded: Float64Chunked = ca
                .into_iter()
                .map(|opt| {
                    Some(match opt {
                        Some(category) => *mapping.get(category).unwrap_or(&self.global_mean),
                        None => self.global_mean,
                    })
                })
                .collect();

            let name = format!("{}_encoded", col_name);
            result = result
                .with_column(encoded.with_name(name.as_str().into()).into_series())
                .map_err(|e| CineScoreError::DataError(e.to_string()))?
                .clone();
            result = result.drop(col_name)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, target: &str) -> Result<DataFrame> {
        self.fit(df, target)?;
        self.transform(df)
    }
}
