//! Finishing-order regressor
//!
//! Known competitors are labelled with their position when the known field is
//! ordered by current qualifying time. This is a proxy: the model learns how the
//! feature vector relates to qualifying order, not to actual race results, and its
//! scores are only meaningful relative to each other. Lower is better.

use crate::features::FeatureVector;
use crate::model::{FitReport, GbmParams, GradientBoostingRegressor};
use crate::{PodiumError, Result};
use serde::Serialize;

/// Normalised split gain attributed to one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: &'static str,
    pub importance: f64,
}

/// Gradient-boosted regressor over [`FeatureVector`]s
#[derive(Debug, Clone, Default)]
pub struct RankPredictor {
    model: GradientBoostingRegressor,
}

impl RankPredictor {
    pub fn new(params: GbmParams) -> Self {
        RankPredictor {
            model: GradientBoostingRegressor::with_params(params),
        }
    }

    /// Train on known competitors and report how well the labels are reproduced
    pub fn fit(&mut self, features: &[FeatureVector], labels: &[f64]) -> Result<FitReport> {
        if features.is_empty() {
            return Err(PodiumError::TrainingDataEmpty);
        }
        if features.len() != labels.len() {
            return Err(PodiumError::InvalidData(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let x = to_matrix(features);
        self.model.fit(&x, labels)?;

        let fitted = self.model.predict(&x)?;
        let report = FitReport::compute(labels, &fitted).ok_or_else(|| {
            PodiumError::InvalidData("could not score the fitted model".to_string())
        })?;
        log::info!("Training fit: {}", report);
        Ok(report)
    }

    /// One score per row, in input order
    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>> {
        if !self.model.is_trained() {
            return Err(PodiumError::NotTrained);
        }
        if features.is_empty() {
            return Ok(Vec::new());
        }
        self.model.predict(&to_matrix(features))
    }

    pub fn importances(&self) -> Vec<FeatureImportance> {
        FeatureVector::NAMES
            .iter()
            .zip(self.model.feature_importances())
            .map(|(&feature, importance)| FeatureImportance { feature, importance })
            .collect()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_trained()
    }
}

fn to_matrix(features: &[FeatureVector]) -> Vec<Vec<f64>> {
    features.iter().map(FeatureVector::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(qualifying_time: f64, fastest_lap: f64) -> FeatureVector {
        FeatureVector {
            fastest_lap,
            compound: 1.0,
            dnf: 0.0,
            qualifying_time,
            avg_qualifying_time: qualifying_time + 0.3,
            avg_finish_position: 5.0,
            dnf_rate: 0.0,
        }
    }

    fn field(n: usize) -> (Vec<FeatureVector>, Vec<f64>) {
        let x: Vec<_> = (0..n)
            .map(|i| vector(60.0 + i as f64 * 0.2, 65.0 + (i % 3) as f64 * 0.1))
            .collect();
        let y = (1..=n).map(|r| r as f64).collect();
        (x, y)
    }

    #[test]
    fn test_predict_before_fit() {
        let predictor = RankPredictor::default();
        assert!(matches!(
            predictor.predict(&[vector(60.0, 65.0)]),
            Err(PodiumError::NotTrained)
        ));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut predictor = RankPredictor::default();
        assert!(matches!(predictor.fit(&[], &[]), Err(PodiumError::TrainingDataEmpty)));
        assert!(matches!(
            predictor.fit(&[vector(60.0, 65.0)], &[1.0, 2.0]),
            Err(PodiumError::InvalidData(_))
        ));
    }

    #[test]
    fn test_fit_recovers_qualifying_order() {
        let (x, y) = field(12);
        let mut predictor = RankPredictor::default();
        let report = predictor.fit(&x, &y).unwrap();

        assert_eq!(report.samples, 12);
        assert!(report.rank_correlation > 0.95);

        let scores = predictor.predict(&x).unwrap();
        assert_eq!(scores.len(), 12);
        assert!(scores[0] < scores[11]);
    }

    #[test]
    fn test_scores_follow_input_order() {
        let (x, y) = field(10);
        let mut predictor = RankPredictor::default();
        predictor.fit(&x, &y).unwrap();
        let scores = predictor.predict(&x).unwrap();

        let order = [7, 2, 9, 0, 5, 3, 8, 1, 6, 4];
        let permuted: Vec<FeatureVector> = order.iter().map(|&i| x[i]).collect();
        let permuted_scores = predictor.predict(&permuted).unwrap();

        assert_eq!(permuted_scores.len(), order.len());
        for (k, &i) in order.iter().enumerate() {
            assert_eq!(permuted_scores[k], scores[i]);
        }
    }

    #[test]
    fn test_empty_prediction_batch() {
        let (x, y) = field(4);
        let mut predictor = RankPredictor::default();
        predictor.fit(&x, &y).unwrap();
        assert!(predictor.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_identical_inputs_identical_scores() {
        let (x, y) = field(8);
        let mut a = RankPredictor::default();
        let mut b = RankPredictor::default();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_follow_feature_order() {
        let (x, y) = field(10);
        let mut predictor = RankPredictor::default();
        predictor.fit(&x, &y).unwrap();

        let importances = predictor.importances();
        let names: Vec<_> = importances.iter().map(|i| i.feature).collect();
        assert_eq!(names, FeatureVector::NAMES.to_vec());
        assert!((importances.iter().map(|i| i.importance).sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
