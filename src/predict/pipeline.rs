//! End-to-end leaderboard run

use crate::data::qualifying::{validate, QualifyingEntry};
use crate::data::source::SessionRecordSource;
use crate::features::trends::SkippedRound;
use crate::features::{EventFeatureBuilder, FeatureTable, TrendAggregator, TrendConfig};
use crate::model::{FitReport, GbmParams};
use crate::predict::ranker::{FeatureImportance, RankPredictor};
use crate::{Config, MissingTrendPolicy, Origin, PredictionRow, Result, RoundRef};
use serde::Serialize;

/// Everything one run needs, taken from [`Config`] plus any CLI overrides
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub season: u16,
    pub target_round: u32,
    pub window_size: u32,
    pub history_season: u16,
    pub history_event: RoundRef,
    pub model: GbmParams,
    pub top_k: usize,
    pub missing_trend: MissingTrendPolicy,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        PipelineConfig {
            season: config.event.season,
            target_round: config.event.round,
            window_size: config.trends.window_size,
            history_season: config.history.season,
            history_event: config.history.event.clone(),
            model: GbmParams::from(&config.model),
            top_k: config.output.top_k,
            missing_trend: config.imputation.missing_trend,
        }
    }
}

/// Predicted finishing order plus what went into it
#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    /// Ascending by predicted score, at most `top_k` rows
    pub rows: Vec<PredictionRow>,
    pub skipped_rounds: Vec<SkippedRound>,
    pub known_count: usize,
    pub new_count: usize,
    pub fit_report: FitReport,
    pub importances: Vec<FeatureImportance>,
}

pub struct Pipeline;

impl Pipeline {
    pub fn run<S: SessionRecordSource + ?Sized>(
        source: &S,
        qualifying: &[QualifyingEntry],
        config: &PipelineConfig,
    ) -> Result<Leaderboard> {
        validate(qualifying)?;

        log::info!(
            "Predicting season {} round {} from {} {}",
            config.season,
            config.target_round,
            config.history_season,
            config.history_event
        );

        let historical =
            EventFeatureBuilder::load(source, config.history_season, &config.history_event)?;

        let window = TrendAggregator::collect(
            source,
            &TrendConfig {
                season: config.season,
                target_round: config.target_round,
                window_size: config.window_size,
            },
        );

        let table = FeatureTable::build(
            &historical,
            qualifying,
            &window.trends,
            config.missing_trend,
        )?;

        let (x, y) = table.training_matrix();
        let mut predictor = RankPredictor::new(config.model.clone());
        let fit_report = predictor.fit(&x, &y)?;

        let known_scores = predictor.predict(&x)?;
        let new_scores = predictor.predict(&table.new_features())?;

        let known_rows = table
            .known
            .iter()
            .zip(known_scores)
            .map(|(row, score)| PredictionRow {
                code: row.code.clone(),
                fastest_lap: row.fastest_lap,
                predicted_score: score,
                origin: Origin::Known,
            });
        let new_rows = table
            .new
            .iter()
            .zip(new_scores)
            .map(|(row, score)| PredictionRow {
                code: row.code.clone(),
                fastest_lap: row.fastest_lap,
                predicted_score: score,
                origin: Origin::New,
            });

        let mut rows: Vec<PredictionRow> = known_rows.chain(new_rows).collect();
        rows.sort_by(|a, b| a.predicted_score.total_cmp(&b.predicted_score));
        rows.truncate(config.top_k);

        for row in &rows {
            log::debug!("{} {:.4} ({})", row.code, row.predicted_score, row.origin);
        }
        log::info!("Leaderboard ready: {} rows", rows.len());

        Ok(Leaderboard {
            rows,
            skipped_rounds: window.skipped,
            known_count: table.known.len(),
            new_count: table.new.len(),
            fit_report,
            importances: predictor.importances(),
        })
    }
}
