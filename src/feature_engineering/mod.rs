//! Derived feature construction
//!
//! Runs after encoding and scaling, on the full table. Adds grouped
//! rating statistics (per director, per genre, per year), a genre
//! popularity score, and a temporal decomposition of the release date.
//! All joins are left-joins on the grouping key and keep the row count
//! unchanged.

use crate::error::{CineScoreError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Builds derived features on top of the encoded table
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every feature stage in order. Rows are first sorted by
    /// release date (unknown dates last) and stay in that order.
    pub fn engineer(&self, df: &DataFrame) -> Result<DataFrame> {
        let df = self.director_success_features(df)?;
        let df = self.genre_features(&df)?;
        let df = self.temporal_features(&df)?;
        let df = self.yearly_baseline(&df)?;
        debug!(columns = df.width(), "feature engineering complete");
        Ok(df)
    }

    /// Mean rating and movie count per director, joined back per row.
    fn director_success_features(&self, df: &DataFrame) -> Result<DataFrame> {
        let sorted = df.sort(
            ["release_date"],
            SortMultipleOptions::default()
                .with_maintain_order(true)
                .with_nulls_last(true),
        )?;

        join_group_stats(
            &sorted,
            "director_encoded",
            "rating",
            "director_avg_rating",
            "director_movie_count",
        )
    }

    /// Mean rating and count per genre, plus a popularity score that
    /// normalizes the count by the largest genre.
    fn genre_features(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = join_group_stats(
            df,
            "genres_encoded",
            "rating",
            "genre_avg_rating",
            "genre_movie_count",
        )?;

        let counts = df.column("genre_movie_count")?.f64()?.clone();
        let max_count = counts.max().unwrap_or(1.0);
        let score: Float64Chunked = counts
            .into_iter()
            .map(|opt| opt.map(|c| c / max_count))
            .collect();
        df.with_column(score.with_name("genre_popularity_score".into()).into_series())?;

        Ok(df)
    }

    /// Decompose the release date into year, month, day, day-of-week
    /// and quarter, then forward-fill the whole table so rows with an
    /// unknown date inherit the preceding row's values. Rows before
    /// the first valid date stay missing.
    fn temporal_features(&self, df: &DataFrame) -> Result<DataFrame> {
        let dates = decode_dates(df.column("release_date")?)?;
        let mut df = df.clone();

        let parts: [(&str, fn(NaiveDate) -> f64); 5] = [
            ("release_year", |d| d.year() as f64),
            ("release_month", |d| d.month() as f64),
            ("release_day", |d| d.day() as f64),
            ("release_dayofweek", |d| {
                d.weekday().num_days_from_monday() as f64
            }),
            ("release_quarter", |d| ((d.month() - 1) / 3 + 1) as f64),
        ];

        for (name, extract) in parts {
            let values: Float64Chunked = dates.iter().map(|opt| opt.map(extract)).collect();
            df.with_column(values.with_name(name.into()).into_series())?;
        }

        forward_fill_frame(&df)
    }

    /// Mean rating per release year, joined back as `yearly_avg_rating`.
    fn yearly_baseline(&self, df: &DataFrame) -> Result<DataFrame> {
        let keys = df.column("release_year")?.f64()?.clone();
        let ratings = df.column("rating")?.f64()?.clone();
        let stats = group_mean_count(&keys, &ratings);

        let yearly: Float64Chunked = keys
            .into_iter()
            .map(|opt| {
                opt.and_then(|k| stats.get(&k.to_bits()))
                    .map(|(mean, _)| *mean)
            })
            .collect();

        let mut df = df.clone();
        df.with_column(yearly.with_name("yearly_avg_rating".into()).into_series())?;
        Ok(df)
    }
}

/// Group `value_col` by `key_col` and left-join the per-group mean and
/// count back onto every row under the two given names.
fn join_group_stats(
    df: &DataFrame,
    key_col: &str,
    value_col: &str,
    mean_name: &str,
    count_name: &str,
) -> Result<DataFrame> {
    let keys = df
        .column(key_col)
        .map_err(|_| CineScoreError::FeatureNotFound(key_col.to_string()))?
        .f64()?
        .clone();
    let values = df.column(value_col)?.f64()?.clone();
    let stats = group_mean_count(&keys, &values);

    let means: Float64Chunked = keys
        .into_iter()
        .map(|opt| {
            opt.and_then(|k| stats.get(&k.to_bits()))
                .map(|(mean, _)| *mean)
        })
        .collect();
    let counts: Float64Chunked = keys
        .into_iter()
        .map(|opt| {
            opt.and_then(|k| stats.get(&k.to_bits()))
                .map(|(_, count)| *count)
        })
        .collect();

    let mut result = df.clone();
    result.with_column(means.with_name(mean_name.into()).into_series())?;
    result.with_column(counts.with_name(count_name.into()).into_series())?;
    Ok(result)
}

/// Per-group (mean, count) of non-null values, keyed by the float key's
/// bit pattern so encoded columns can serve as grouping keys.
fn group_mean_count(
    keys: &Float64Chunked,
    values: &Float64Chunked,
) -> HashMap<u64, (f64, f64)> {
    let mut sums: HashMap<u64, (f64, f64)> = HashMap::new();

    for (key, value) in keys.into_iter().zip(values.into_iter()) {
        let (Some(key), Some(value)) = (key, value) else {
            continue;
        };
        let entry = sums.entry(key.to_bits()).or_insert((0.0, 0.0));
        entry.0 += value;
        entry.1 += 1.0;
    }

    sums.into_iter()
        .map(|(key, (sum, count))| (key, (sum / count, count)))
        .collect()
}

/// Forward-fill every column independently. Leading nulls remain.
fn forward_fill_frame(df: &DataFrame) -> Result<DataFrame> {
    let filled: Vec<Column> = df
        .get_columns()
        .iter()
        .map(|col| {
            col.as_materialized_series()
                .fill_null(FillNullStrategy::Forward(None))
                .map(Column::from)
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    Ok(DataFrame::new(filled)?)
}

/// Materialize a `Date` column as chrono dates.
fn decode_dates(col: &Column) -> Result<Vec<Option<NaiveDate>>> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| CineScoreError::DataError("invalid epoch date".to_string()))?;
    let ca = col.as_materialized_series().date()?.clone();

    Ok(ca
        .into_iter()
        .map(|opt| opt.map(|days| epoch + chrono::Duration::days(days as i64)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::DataCleaner;

    fn engineered_sample() -> DataFrame {
        let raw = df! {
            "release_date" => &["2010", "1997", "2010"],
            "rating" => &[8.8, 7.8, 6.0],
            "director_encoded" => &[0.5, -0.2, 0.5],
            "genres_encoded" => &[1.0, 2.0, 1.0],
        }
        .unwrap();
        let cleaned = DataCleaner::new().clean(&raw).unwrap();
        FeatureEngineer::new().engineer(&cleaned).unwrap()
    }

    #[test]
    fn test_director_stats_join_keeps_row_count() {
        let df = engineered_sample();
        assert_eq!(df.height(), 3);

        let counts = df.column("director_movie_count").unwrap().f64().unwrap();
        let means = df.column("director_avg_rating").unwrap().f64().unwrap();
        // Rows sorted by date: 1997 first, then the two 2010 rows
        assert_eq!(counts.get(0), Some(1.0));
        assert_eq!(counts.get(1), Some(2.0));
        assert!((means.get(1).unwrap() - 7.4).abs() < 1e-10);
    }

    #[test]
    fn test_genre_popularity_is_normalized_by_largest_genre() {
        let df = engineered_sample();
        let score = df.column("genre_popularity_score").unwrap().f64().unwrap();

        // genre 1.0 has two movies (max), genre 2.0 one
        assert_eq!(score.get(0), Some(0.5));
        assert_eq!(score.get(1), Some(1.0));
        assert_eq!(score.get(2), Some(1.0));
    }

    #[test]
    fn test_temporal_decomposition() {
        let df = engineered_sample();

        let year = df.column("release_year").unwrap().f64().unwrap();
        assert_eq!(year.get(0), Some(1997.0));
        assert_eq!(year.get(1), Some(2010.0));

        let quarter = df.column("release_quarter").unwrap().f64().unwrap();
        assert_eq!(quarter.get(0), Some(1.0));

        // 1997-01-01 was a Wednesday
        let dow = df.column("release_dayofweek").unwrap().f64().unwrap();
        assert_eq!(dow.get(0), Some(2.0));
    }

    #[test]
    fn test_unparsable_date_inherits_preceding_row() {
        let raw = df! {
            "release_date" => &["2005", "N/A"],
            "rating" => &[7.0, 6.5],
            "director_encoded" => &[0.1, 0.2],
            "genres_encoded" => &[0.3, 0.4],
        }
        .unwrap();
        let cleaned = DataCleaner::new().clean(&raw).unwrap();
        let df = FeatureEngineer::new().engineer(&cleaned).unwrap();

        // Null dates sort last and are forward-filled from 2005
        let year = df.column("release_year").unwrap().f64().unwrap();
        assert_eq!(year.get(1), Some(2005.0));
        let month = df.column("release_month").unwrap().f64().unwrap();
        assert_eq!(month.get(1), Some(1.0));
    }

    #[test]
    fn test_yearly_baseline_join() {
        let df = engineered_sample();
        let yearly = df.column("yearly_avg_rating").unwrap().f64().unwrap();

        assert_eq!(yearly.get(0), Some(7.8));
        assert!((yearly.get(1).unwrap() - 7.4).abs() < 1e-10);
    }
}
