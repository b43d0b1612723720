//! Raw-table cleaning
//!
//! Normalizes the freshly loaded table into typed columns: duplicate
//! rows are dropped, the release year becomes a proper date, and the
//! numeric-looking text columns (rating, duration, vote counts) are
//! coerced to floats with unparsable values mapped to null.

use crate::error::{CineScoreError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

/// Cleans a loaded table in place, column by column
#[derive(Debug, Clone, Default)]
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Run every cleaning step that applies to the columns present.
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        let before = df.height();
        let mut df = drop_duplicate_rows(df)?;
        if df.height() < before {
            info!(removed = before - df.height(), "dropped duplicate rows");
        }

        if df.column("release_date").is_ok() {
            let dates = parse_release_years(df.column("release_date")?)?;
            df.with_column(dates)?;
        }
        if df.column("rating").is_ok() {
            let rating = df.column("rating")?.cast(&DataType::Float64)?;
            df.with_column(rating)?;
        }
        if df.column("Duration").is_ok() {
            let duration = parse_duration_minutes(df.column("Duration")?)?;
            df.with_column(duration)?;
        } else {
            debug!("no Duration column, skipping");
        }
        if df.column("Votes").is_ok() {
            let votes = parse_vote_counts(df.column("Votes")?)?;
            df.with_column(votes)?;
        } else {
            debug!("no Votes column, skipping");
        }

        Ok(df)
    }
}

/// Keep the first occurrence of each distinct row, preserving order.
fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame> {
    let mut seen: HashSet<String> = HashSet::with_capacity(df.height());
    let mut keep: Vec<IdxSize> = Vec::with_capacity(df.height());
    let columns = df.get_columns();

    for row in 0..df.height() {
        let mut fingerprint = String::new();
        for col in columns {
            let value = col.get(row)?;
            fingerprint.push_str(&format!("{:?}\u{1f}", value));
        }
        if seen.insert(fingerprint) {
            keep.push(row as IdxSize);
        }
    }

    let idx = IdxCa::from_vec("idx".into(), keep);
    Ok(df.take(&idx)?)
}

/// Parse the release year column into a `Date` column pointing at
/// January 1st of that year. Values that do not parse become null.
fn parse_release_years(col: &Column) -> Result<Column> {
    let series = col.as_materialized_series();
    let years: Vec<Option<i32>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<i32>().ok()))
            .collect(),
        _ => {
            let cast = series.cast(&DataType::Int32)?;
            cast.i32()?.into_iter().collect()
        }
    };

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| CineScoreError::DataError("invalid epoch date".to_string()))?;
    let days: Vec<Option<i32>> = years
        .into_iter()
        .map(|y| {
            y.and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
                .map(|date| (date - epoch).num_days() as i32)
        })
        .collect();

    let ca = Int32Chunked::from_iter_options("release_date".into(), days.into_iter());
    Ok(ca.into_date().into_series().into())
}

/// Extract the first run of digits from a duration string ("109 min"
/// becomes 109.0). Missing or digit-free values become null.
fn parse_duration_minutes(col: &Column) -> Result<Column> {
    let pattern = Regex::new(r"(\d+)").map_err(|e| CineScoreError::DataError(e.to_string()))?;
    let series = col.as_materialized_series();

    let minutes: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| {
                v.and_then(|s| pattern.captures(s))
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
            })
            .collect(),
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().collect()
        }
    };

    let ca = Float64Chunked::from_iter_options("Duration".into(), minutes.into_iter());
    Ok(ca.into_series().into())
}

/// Strip thousands separators from vote counts and parse as float.
fn parse_vote_counts(col: &Column) -> Result<Column> {
    let series = col.as_materialized_series();

    let votes: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.replace(',', "").trim().parse::<f64>().ok()))
            .collect(),
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().collect()
        }
    };

    let ca = Float64Chunked::from_iter_options("Votes".into(), votes.into_iter());
    Ok(ca.into_series().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence() {
        let df = df! {
            "title" => &["A", "B", "A", "C"],
            "rating" => &[1.0, 2.0, 1.0, 3.0],
        }
        .unwrap();

        let cleaned = DataCleaner::new().clean(&df).unwrap();
        assert_eq!(cleaned.height(), 3);
        let titles: Vec<&str> = cleaned
            .column("title")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_release_year_becomes_date() {
        let df = df! {
            "release_date" => &["2010", "N/A", "1999"],
        }
        .unwrap();

        let cleaned = DataCleaner::new().clean(&df).unwrap();
        let dates = cleaned.column("release_date").unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);
        assert_eq!(dates.null_count(), 1);
    }

    #[test]
    fn test_duration_digits_are_extracted() {
        let df = df! {
            "Duration" => &[Some("109 min"), None, Some("contains no digits")],
        }
        .unwrap();

        let cleaned = DataCleaner::new().clean(&df).unwrap();
        let duration = cleaned.column("Duration").unwrap();
        assert_eq!(duration.dtype(), &DataType::Float64);
        assert_eq!(duration.f64().unwrap().get(0), Some(109.0));
        assert_eq!(duration.null_count(), 2);
    }

    #[test]
    fn test_votes_commas_are_stripped() {
        let df = df! {
            "Votes" => &["1,234", "56", "bad"],
        }
        .unwrap();

        let cleaned = DataCleaner::new().clean(&df).unwrap();
        let votes = cleaned.column("Votes").unwrap();
        assert_eq!(votes.f64().unwrap().get(0), Some(1234.0));
        assert_eq!(votes.f64().unwrap().get(1), Some(56.0));
        assert_eq!(votes.f64().unwrap().get(2), None);
    }

    #[test]
    fn test_unparsable_ratings_become_null() {
        let df = df! {
            "rating" => &["8.8", "not rated", "7.1"],
        }
        .unwrap();

        let cleaned = DataCleaner::new().clean(&df).unwrap();
        let rating = cleaned.column("rating").unwrap();
        assert_eq!(rating.dtype(), &DataType::Float64);
        assert_eq!(rating.null_count(), 1);
    }
}
