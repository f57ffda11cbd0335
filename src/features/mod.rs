//! Feature extraction
//!
//! Converts raw session records into model-ready feature vectors.

pub mod encoding;
pub mod event;
pub mod table;
pub mod trends;

pub use encoding::{CompoundEncoder, UNKNOWN_COMPOUND};
pub use event::{CompetitorRecord, EventFeatureBuilder, EventFeatures};
pub use table::{FeatureTable, FeatureVector, Partition, PopulationFallback};
pub use trends::{
    RoundObservation, SkippedRound, TrendAggregator, TrendConfig, TrendRecord, TrendWindow,
};
