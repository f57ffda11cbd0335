//! Session record sources
//!
//! Anything that can hand back lap and result records for a
//! (season, round, session) triple.

use crate::{CompetitorCode, FinishStatus, PodiumError, Result, RoundRef, SessionType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single timed (or untimed) lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub competitor: CompetitorCode,
    #[serde(default)]
    pub lap_number: Option<u32>,
    /// Lap time in seconds; absent for deleted or untimed laps
    #[serde(default)]
    pub lap_time: Option<f64>,
    #[serde(default)]
    pub compound: Option<String>,
}

impl LapRecord {
    /// A lap counts as valid when it carries a finite, positive time
    pub fn valid_time(&self) -> Option<f64> {
        self.lap_time.filter(|t| t.is_finite() && *t > 0.0)
    }
}

/// Classification line for one competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub competitor: CompetitorCode,
    #[serde(default)]
    pub position: Option<u32>,
    pub status: FinishStatus,
}

/// Everything a source returns for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecords {
    pub laps: Vec<LapRecord>,
    pub results: Vec<ResultRecord>,
}

impl SessionRecords {
    /// Laps belonging to one competitor, in session order
    pub fn laps_for<'a>(
        &'a self,
        competitor: &'a CompetitorCode,
    ) -> impl Iterator<Item = &'a LapRecord> + 'a {
        self.laps.iter().filter(move |l| &l.competitor == competitor)
    }

    /// Fastest valid lap per competitor; competitors without a timed lap are absent
    pub fn best_laps(&self) -> HashMap<CompetitorCode, f64> {
        let mut best: HashMap<CompetitorCode, f64> = HashMap::new();
        for lap in &self.laps {
            if let Some(time) = lap.valid_time() {
                best.entry(lap.competitor.clone())
                    .and_modify(|b| *b = b.min(time))
                    .or_insert(time);
            }
        }
        best
    }
}

/// Trait for all session record providers
pub trait SessionRecordSource {
    /// Fetch laps and results for a session. May fail per call.
    fn get_records(
        &self,
        season: u16,
        round: &RoundRef,
        session: SessionType,
    ) -> Result<SessionRecords>;
}

/// Source backed by records held in memory
///
/// Rounds can be registered under a number, a name, or both. Rounds marked as
/// failing return a retrieval error, which makes the source useful for exercising
/// the skip-and-continue paths.
#[derive(Debug, Default)]
pub struct InMemorySource {
    sessions: HashMap<(u16, u32, SessionType), SessionRecords>,
    names: HashMap<(u16, String), u32>,
    failing: HashSet<(u16, u32)>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a numbered round
    pub fn with_session(
        mut self,
        season: u16,
        round: u32,
        session: SessionType,
        records: SessionRecords,
    ) -> Self {
        self.sessions.insert((season, round, session), records);
        self
    }

    /// Give a numbered round an event name so it can be looked up by name
    pub fn with_name(mut self, season: u16, round: u32, name: &str) -> Self {
        self.names.insert((season, name.to_lowercase()), round);
        self
    }

    /// Make every session of a round fail on retrieval
    pub fn with_failing_round(mut self, season: u16, round: u32) -> Self {
        self.failing.insert((season, round));
        self
    }

    fn resolve(&self, season: u16, round: &RoundRef) -> Option<u32> {
        match round {
            RoundRef::Number(n) => Some(*n),
            RoundRef::Name(name) => self.names.get(&(season, name.to_lowercase())).copied(),
        }
    }
}

impl SessionRecordSource for InMemorySource {
    fn get_records(
        &self,
        season: u16,
        round: &RoundRef,
        session: SessionType,
    ) -> Result<SessionRecords> {
        let number = self
            .resolve(season, round)
            .ok_or_else(|| PodiumError::EventNotFound {
                season,
                round: round.clone(),
            })?;

        if self.failing.contains(&(season, number)) {
            return Err(PodiumError::Retrieval {
                season,
                round: round.clone(),
                session,
                message: "source unavailable".to_string(),
            });
        }

        self.sessions
            .get(&(season, number, session))
            .cloned()
            .ok_or_else(|| PodiumError::Retrieval {
                season,
                round: round.clone(),
                session,
                message: "session not loaded".to_string(),
            })
    }
}
