//! Regression quality metrics

use serde::{Deserialize, Serialize};

/// Held-out evaluation of a regression model
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute all metrics; returns zeros for empty input
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            rmse: rmse(y_true, y_pred),
            mae: mae(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        }
    }

    /// Round for reporting: RMSE and MAE to 2 places, R² to 4
    pub fn rounded(&self) -> Self {
        Self {
            rmse: crate::round_to(self.rmse, 2),
            mae: crate::round_to(self.mae, 2),
            r2: crate::round_to(self.r2, 4),
        }
    }
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / n as f64
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n as f64
}

/// Coefficient of determination
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }
    let mean = y_true.iter().take(n).sum::<f64>() / n as f64;
    let ss_tot: f64 = y_true.iter().take(n).map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
