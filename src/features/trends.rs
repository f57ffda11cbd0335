//! Recent-form trends
//!
//! Rolling averages of qualifying pace, finishing position and DNF rate over the
//! rounds immediately before the target round.

use crate::data::source::SessionRecordSource;
use crate::{CompetitorCode, PodiumError, Result, RoundRef, SessionType};
use serde::Serialize;
use std::collections::HashMap;

/// Which season, which round is being predicted, and how far back to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendConfig {
    pub season: u16,
    pub target_round: u32,
    pub window_size: u32,
}

/// One competitor's showing in one past round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundObservation {
    pub round: u32,
    pub code: CompetitorCode,
    /// Best qualifying lap, absent without a timed lap
    pub qualifying_best: Option<f64>,
    /// Classified finishing position, absent if unclassified
    pub finish_position: Option<u32>,
    /// Absent when the competitor has no race result that round
    pub dnf: Option<bool>,
}

/// Rolling form for one competitor. Each field is averaged only over the rounds
/// that supplied it, and stays `None` if no round did.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    pub code: CompetitorCode,
    pub avg_qualifying_time: Option<f64>,
    pub avg_finish_position: Option<f64>,
    pub dnf_rate: Option<f64>,
    /// Rounds in which the competitor appeared at all
    pub rounds: usize,
}

/// A round left out of the window and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRound {
    pub round: u32,
    pub reason: String,
}

/// Result of collecting a trend window
#[derive(Debug, Clone, Default)]
pub struct TrendWindow {
    pub trends: HashMap<CompetitorCode, TrendRecord>,
    pub included_rounds: Vec<u32>,
    pub skipped: Vec<SkippedRound>,
}

/// Running sums for one competitor
#[derive(Debug, Clone, Default)]
struct TrendAccumulator {
    rounds: usize,
    quali_sum: f64,
    quali_count: usize,
    position_sum: f64,
    position_count: usize,
    dnf_sum: f64,
    race_count: usize,
}

impl TrendAccumulator {
    fn update(&mut self, obs: &RoundObservation) {
        self.rounds += 1;

        if let Some(t) = obs.qualifying_best {
            self.quali_sum += t;
            self.quali_count += 1;
        }
        if let Some(p) = obs.finish_position {
            self.position_sum += p as f64;
            self.position_count += 1;
        }
        if let Some(dnf) = obs.dnf {
            self.dnf_sum += if dnf { 1.0 } else { 0.0 };
            self.race_count += 1;
        }
    }

    fn avg_qualifying_time(&self) -> Option<f64> {
        (self.quali_count > 0).then(|| self.quali_sum / self.quali_count as f64)
    }

    fn avg_finish_position(&self) -> Option<f64> {
        (self.position_count > 0).then(|| self.position_sum / self.position_count as f64)
    }

    fn dnf_rate(&self) -> Option<f64> {
        (self.race_count > 0).then(|| self.dnf_sum / self.race_count as f64)
    }

    fn into_record(self, code: CompetitorCode) -> TrendRecord {
        TrendRecord {
            avg_qualifying_time: self.avg_qualifying_time(),
            avg_finish_position: self.avg_finish_position(),
            dnf_rate: self.dnf_rate(),
            rounds: self.rounds,
            code,
        }
    }
}

/// Rounds feeding the window: up to `window_size` rounds before the target,
/// never below round 1
pub fn rounds_to_include(target_round: u32, window_size: u32) -> Vec<u32> {
    let start = target_round.saturating_sub(window_size).max(1);
    (start..target_round).collect()
}

/// Average observations per competitor
pub fn compute_trends(observations: &[RoundObservation]) -> HashMap<CompetitorCode, TrendRecord> {
    let mut acc: HashMap<CompetitorCode, TrendAccumulator> = HashMap::new();
    for obs in observations {
        acc.entry(obs.code.clone()).or_default().update(obs);
    }

    acc.into_iter()
        .map(|(code, a)| (code.clone(), a.into_record(code)))
        .collect()
}

/// Collects trend windows from a session source
pub struct TrendAggregator;

impl TrendAggregator {
    /// Fetch every round in the window and aggregate. A round whose qualifying or
    /// race session cannot be loaded is skipped and reported, never fatal.
    pub fn collect<S: SessionRecordSource + ?Sized>(source: &S, config: &TrendConfig) -> TrendWindow {
        let rounds = rounds_to_include(config.target_round, config.window_size);
        if rounds.is_empty() {
            log::info!(
                "No rounds before round {} in season {}; trend window is empty",
                config.target_round,
                config.season
            );
            return TrendWindow::default();
        }

        let (observations, included_rounds, skipped) = rounds.into_iter().fold(
            (Vec::new(), Vec::new(), Vec::new()),
            |(mut obs, mut included, mut skipped), round| {
                match Self::observe_round(source, config.season, round) {
                    Ok(round_obs) => {
                        obs.extend(round_obs);
                        included.push(round);
                    }
                    Err(e) => {
                        log::warn!("Failed to load round {}: {}", round, e);
                        skipped.push(SkippedRound {
                            round,
                            reason: e.to_string(),
                        });
                    }
                }
                (obs, included, skipped)
            },
        );

        let trends = if included_rounds.is_empty() {
            HashMap::new()
        } else {
            compute_trends(&observations)
        };

        log::info!(
            "Trend window for season {} round {}: rounds {:?} included, {} skipped, {} competitors",
            config.season,
            config.target_round,
            included_rounds,
            skipped.len(),
            trends.len()
        );

        TrendWindow {
            trends,
            included_rounds,
            skipped,
        }
    }

    /// Observations for one round; both sessions must load
    pub fn observe_round<S: SessionRecordSource + ?Sized>(
        source: &S,
        season: u16,
        round: u32,
    ) -> Result<Vec<RoundObservation>> {
        let round_ref = RoundRef::Number(round);
        let quali = source.get_records(season, &round_ref, SessionType::Qualifying)?;
        let race = source.get_records(season, &round_ref, SessionType::Race)?;

        if quali.laps.is_empty() && race.results.is_empty() {
            return Err(PodiumError::Retrieval {
                season,
                round: round_ref,
                session: SessionType::Race,
                message: "round has no laps or results".to_string(),
            });
        }

        let mut best = quali.best_laps();
        let mut observations = Vec::with_capacity(race.results.len() + best.len());

        for result in &race.results {
            observations.push(RoundObservation {
                round,
                code: result.competitor.clone(),
                qualifying_best: best.remove(&result.competitor),
                finish_position: result.position,
                dnf: Some(!result.status.is_classified_finish()),
            });
        }

        // Qualified but absent from the race classification
        let mut remaining: Vec<_> = best.into_iter().collect();
        remaining.sort_by(|a, b| a.0.cmp(&b.0));
        for (code, time) in remaining {
            observations.push(RoundObservation {
                round,
                code,
                qualifying_best: Some(time),
                finish_position: None,
                dnf: None,
            });
        }

        Ok(observations)
    }
}
