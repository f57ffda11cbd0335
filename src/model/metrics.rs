//! Training-fit diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// How well predictions track the labels they were trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Spearman correlation between predicted and label order
    pub rank_correlation: f64,
}

impl FitReport {
    /// `None` for empty or mismatched inputs
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Option<Self> {
        let n = y_true.len();
        if n == 0 || n != y_pred.len() {
            return None;
        }

        let mse = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n as f64;

        let mae = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n as f64;

        let mean_true = y_true.iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();
        let r2 = if ss_tot != 0.0 {
            1.0 - mse * n as f64 / ss_tot
        } else {
            0.0
        };

        Some(FitReport {
            samples: n,
            rmse: mse.sqrt(),
            mae,
            r2,
            rank_correlation: spearman(y_true, y_pred),
        })
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} | RMSE: {:.4} | MAE: {:.4} | R2: {:.4} | Spearman: {:.4}",
            self.samples, self.rmse, self.mae, self.r2, self.rank_correlation
        )
    }
}

/// Average ranks (1-based), ties share the mean of their positions
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            out[idx] = avg;
        }
        i = j + 1;
    }
    out
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    if va == 0.0 || vb == 0.0 {
        0.0
    } else {
        cov / (va.sqrt() * vb.sqrt())
    }
}

fn spearman(a: &[f64], b: &[f64]) -> f64 {
    pearson(&ranks(a), &ranks(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let report = FitReport::compute(&y, &y).unwrap();
        assert_eq!(report.rmse, 0.0);
        assert_eq!(report.r2, 1.0);
        assert!((report.rank_correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reversed_order() {
        let report = FitReport::compute(&[1.0, 2.0, 3.0], &[3.2, 2.1, 0.9]).unwrap();
        assert!((report.rank_correlation + 1.0).abs() < 1e-12);
        assert!(report.r2 < 0.0);
    }

    #[test]
    fn test_ranks_with_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_mismatched_inputs() {
        assert!(FitReport::compute(&[], &[]).is_none());
        assert!(FitReport::compute(&[1.0], &[1.0, 2.0]).is_none());
    }
}
