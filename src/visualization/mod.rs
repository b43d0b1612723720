//! Feature importance chart

use crate::error::{CineScoreError, Result};
use plotters::prelude::*;
use std::path::Path;

const TOP_FEATURES: usize = 10;

/// Render a horizontal bar chart of the most important features to a
/// PNG file. Pairs are expected sorted most-important first; only the
/// top ten are drawn.
pub fn render_importance_chart(pairs: &[(String, f64)], path: &Path) -> Result<()> {
    if pairs.is_empty() {
        return Err(CineScoreError::ChartError(
            "no features to chart".to_string(),
        ));
    }

    let top: Vec<(String, f64)> = pairs.iter().take(TOP_FEATURES).cloned().collect();
    let max_importance = top
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::MIN, f64::max)
        .max(1e-12);

    let root = BitMapBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature importance (top 10)", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(200)
        .build_cartesian_2d(0.0..max_importance * 1.1, 0..top.len() as i32)
        .map_err(chart_err)?;

    let labels = top.clone();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(top.len())
        .y_label_formatter(&move |idx: &i32| {
            labels
                .get(*idx as usize)
                .map(|(name, _)| name.clone())
                .unwrap_or_default()
        })
        .x_desc("importance")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(top.iter().enumerate().map(|(i, (_, value))| {
            Rectangle::new(
                [(0.0, i as i32), (*value, i as i32 + 1)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

fn chart_err<E: std::fmt::Display>(e: E) -> CineScoreError {
    CineScoreError::ChartError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importance.png");

        let pairs = vec![
            ("director_avg_rating".to_string(), 0.4),
            ("Votes".to_string(), 0.3),
            ("genre_popularity_score".to_string(), 0.2),
            ("release_year".to_string(), 0.1),
        ];
        render_importance_chart(&pairs, &path).unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn test_empty_importances_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importance.png");
        assert!(render_importance_chart(&[], &path).is_err());
    }
}
