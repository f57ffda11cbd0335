//! Gradient Boosting Machine implementation
//!
//! Squared-error boosting over least-squares regression trees. The ensemble starts
//! from the target mean and each tree fits the residuals of the ones before it,
//! scaled by the learning rate.

use crate::model::tree::{RegressionTree, TreeParams};
use crate::{ModelConfig, PodiumError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// GBM hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmParams {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Seed for the feature visiting order
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl From<&ModelConfig> for GbmParams {
    fn from(config: &ModelConfig) -> Self {
        GbmParams {
            n_estimators: config.n_estimators,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            seed: config.seed,
        }
    }
}

impl GbmParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
            min_samples_leaf: self.min_samples_leaf.max(1),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    params: GbmParams,
    init: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new() -> Self {
        Self::with_params(GbmParams::default())
    }

    pub fn with_params(params: GbmParams) -> Self {
        Self {
            params,
            init: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Train on a row-major feature matrix
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() {
            return Err(PodiumError::TrainingDataEmpty);
        }
        if x.len() != y.len() {
            return Err(PodiumError::InvalidData(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(PodiumError::InvalidData("feature rows are empty".to_string()));
        }
        if x.iter().any(|row| row.len() != n_features) {
            return Err(PodiumError::InvalidData(
                "feature rows have differing lengths".to_string(),
            ));
        }
        if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
            return Err(PodiumError::InvalidData(
                "training data contains non-finite values".to_string(),
            ));
        }

        log::info!(
            "Training GBM regressor with {} samples and {} features",
            x.len(),
            n_features
        );
        log::debug!("Parameters: {:?}", self.params);

        let tree_params = self.params.tree_params();
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut current = vec![init; y.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree = RegressionTree::fit(x, &residuals, &tree_params, &mut rng);
            for (pred, row) in current.iter_mut().zip(x) {
                *pred += self.params.learning_rate * tree.predict_one(row);
            }
            trees.push(tree);
        }

        self.init = init;
        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    /// Raw regression output, one value per row
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_trained() {
            return Err(PodiumError::NotTrained);
        }

        x.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(PodiumError::InvalidData(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                Ok(self.trees.iter().fold(self.init, |acc, tree| {
                    acc + self.params.learning_rate * tree.predict_one(row)
                }))
            })
            .collect()
    }

    /// Split gain per feature summed over all trees, normalised to sum to 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, imp) in totals.iter_mut().zip(tree.importances()) {
                *total += imp;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for t in &mut totals {
                *t /= sum;
            }
        }
        totals
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn is_trained(&self) -> bool {
        self.n_features > 0
    }
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64, (i as f64 * 0.5).sin()])
            .collect();
        let y = x.iter().map(|r| r[0] * 0.5 + r[1] * 2.0 + 0.1).collect();
        (x, y)
    }

    #[test]
    fn test_gbm_regressor_fits_training_data() {
        let (x, y) = create_test_data(60);
        let mut model = GradientBoostingRegressor::new();
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), y.len());

        let mse = preds
            .iter()
            .zip(&y)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        let var = {
            let m = y.iter().sum::<f64>() / y.len() as f64;
            y.iter().map(|t| (t - m).powi(2)).sum::<f64>() / y.len() as f64
        };
        assert!(mse < var * 0.05, "mse {} vs variance {}", mse, var);
    }

    #[test]
    fn test_gbm_deterministic() {
        let (x, y) = create_test_data(30);

        let mut a = GradientBoostingRegressor::new();
        a.fit(&x, &y).unwrap();
        let mut b = GradientBoostingRegressor::new();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_zero_estimators_predicts_mean() {
        let params = GbmParams {
            n_estimators: 0,
            ..GbmParams::default()
        };
        let mut model = GradientBoostingRegressor::with_params(params);
        model.fit(&[vec![1.0], vec![2.0]], &[1.0, 3.0]).unwrap();
        assert_eq!(model.predict(&[vec![5.0]]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_errors() {
        let mut model = GradientBoostingRegressor::new();
        assert!(matches!(model.predict(&[vec![1.0]]), Err(PodiumError::NotTrained)));
        assert!(matches!(model.fit(&[], &[]), Err(PodiumError::TrainingDataEmpty)));
        assert!(matches!(
            model.fit(&[vec![1.0]], &[1.0, 2.0]),
            Err(PodiumError::InvalidData(_))
        ));
        assert!(matches!(
            model.fit(&[vec![f64::NAN]], &[1.0]),
            Err(PodiumError::InvalidData(_))
        ));

        model.fit(&[vec![1.0, 2.0]], &[1.0]).unwrap();
        assert!(matches!(model.predict(&[vec![1.0]]), Err(PodiumError::InvalidData(_))));
    }

    #[test]
    fn test_feature_importances_sum_to_one() {
        let (x, y) = create_test_data(40);
        let mut model = GradientBoostingRegressor::new();
        model.fit(&x, &y).unwrap();

        let imp = model.feature_importances();
        assert_eq!(imp.len(), 2);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
