//! Regression evaluation metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Scores for one evaluation pass over a prediction batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute all metrics from paired true/predicted values.
    /// A constant target makes R² undefined; it reports 0.0 there.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(yt, yp)| yt - yp)
            .collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;

        let y_mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        Self {
            mae,
            mse,
            rmse: mse.sqrt(),
            r2,
            n_samples: y_true.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![1.0, 2.0, 3.0];
        let metrics = RegressionMetrics::compute(&y, &y);

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.n_samples, 3);
    }

    #[test]
    fn test_known_errors() {
        let y_true = array![2.0, 4.0];
        let y_pred = array![3.0, 2.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert!((metrics.mae - 1.5).abs() < 1e-12);
        assert!((metrics.mse - 2.5).abs() < 1e-12);
        assert!((metrics.rmse - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_reports_zero_r2() {
        let y_true = array![5.0, 5.0, 5.0];
        let y_pred = array![4.0, 5.0, 6.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert_eq!(metrics.r2, 0.0);
    }
}
