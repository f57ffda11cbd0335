//! Regression models
//!
//! Gradient-boosted trees and training diagnostics.

pub mod gbm;
pub mod metrics;
pub mod tree;

pub use gbm::{GbmParams, GradientBoostingRegressor};
pub use metrics::FitReport;
pub use tree::{RegressionTree, TreeParams};
