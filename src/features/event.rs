//! Per-competitor features for a single event

use crate::data::source::{SessionRecordSource, SessionRecords};
use crate::features::encoding::{mode, UNKNOWN_COMPOUND};
use crate::{CompetitorCode, Result, RoundRef, SessionType};
use std::collections::{HashMap, HashSet};

/// What one competitor did in the historical event
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorRecord {
    pub code: CompetitorCode,
    /// Fastest valid lap in seconds
    pub fastest_lap: f64,
    /// Most used tyre compound label
    pub compound: String,
    pub dnf: bool,
    /// Classified position, absent when unclassified
    pub position: Option<u32>,
}

/// Competitor records for one event, kept in result order
#[derive(Debug, Clone, Default)]
pub struct EventFeatures {
    records: Vec<CompetitorRecord>,
    index: HashMap<CompetitorCode, usize>,
}

impl EventFeatures {
    /// Keeps the first record for each competitor code
    pub fn from_records(records: Vec<CompetitorRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());
        for record in records {
            if index.contains_key(&record.code) {
                log::warn!("Duplicate record for {} in event, keeping the first", record.code);
                continue;
            }
            index.insert(record.code.clone(), unique.len());
            unique.push(record);
        }
        EventFeatures {
            records: unique,
            index,
        }
    }

    pub fn get(&self, code: &CompetitorCode) -> Option<&CompetitorRecord> {
        self.index.get(code).map(|&i| &self.records[i])
    }

    pub fn contains(&self, code: &CompetitorCode) -> bool {
        self.index.contains_key(code)
    }

    pub fn records(&self) -> &[CompetitorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Turns one event's race records into competitor records
pub struct EventFeatureBuilder;

impl EventFeatureBuilder {
    /// Build competitor records, skipping anyone without a valid lap
    pub fn build(records: &SessionRecords) -> EventFeatures {
        let mut out = Vec::with_capacity(records.results.len());

        let mut seen = HashSet::new();
        for result in &records.results {
            if !seen.insert(&result.competitor) {
                log::warn!(
                    "{} appears more than once in the results, keeping the first",
                    result.competitor
                );
                continue;
            }
            let laps: Vec<_> = records.laps_for(&result.competitor).collect();

            let fastest_lap = laps
                .iter()
                .filter_map(|l| l.valid_time())
                .min_by(|a, b| a.total_cmp(b));

            let Some(fastest_lap) = fastest_lap else {
                log::debug!("Skipping {}: no valid laps", result.competitor);
                continue;
            };

            let compound = mode(
                laps.iter()
                    .filter_map(|l| l.compound.as_deref())
                    .map(|c| c.trim().to_uppercase())
                    .filter(|c| !c.is_empty()),
            )
            .unwrap_or_else(|| UNKNOWN_COMPOUND.to_string());

            out.push(CompetitorRecord {
                code: result.competitor.clone(),
                fastest_lap,
                compound,
                dnf: !result.status.is_classified_finish(),
                position: result.position,
            });
        }

        EventFeatures::from_records(out)
    }

    /// Fetch the race session of an event and build its features
    pub fn load<S: SessionRecordSource + ?Sized>(
        source: &S,
        season: u16,
        event: &RoundRef,
    ) -> Result<EventFeatures> {
        let records = source.get_records(season, event, SessionType::Race)?;
        let features = Self::build(&records);
        log::info!(
            "Built event features for {} {}: {} of {} classified entries usable",
            season,
            event,
            features.len(),
            records.results.len()
        );
        Ok(features)
    }
}
