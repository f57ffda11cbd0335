//! Ranking and leaderboard assembly
//!
//! Fit the finishing-order regressor on known competitors and score the field.

pub mod pipeline;
pub mod ranker;

pub use pipeline::{Leaderboard, Pipeline, PipelineConfig};
pub use ranker::{FeatureImportance, RankPredictor};
