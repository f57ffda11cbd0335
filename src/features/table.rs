//! The flat feature table the model consumes
//!
//! Joins historical competitor records, current qualifying times and trend
//! records, splits the field into known and new competitors, and fills the gaps
//! new competitors leave with population-level fallbacks.

use crate::data::qualifying::QualifyingEntry;
use crate::features::encoding::{mode, CompoundEncoder};
use crate::features::event::EventFeatures;
use crate::features::trends::TrendRecord;
use crate::{CompetitorCode, MissingTrendPolicy, PodiumError, Result};
use std::collections::HashMap;

/// Model input for one competitor, in fixed feature order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub fastest_lap: f64,
    pub compound: f64,
    pub dnf: f64,
    pub qualifying_time: f64,
    pub avg_qualifying_time: f64,
    pub avg_finish_position: f64,
    pub dnf_rate: f64,
}

impl FeatureVector {
    pub const DIM: usize = 7;

    pub const NAMES: [&'static str; Self::DIM] = [
        "fastest_lap",
        "compound",
        "dnf",
        "qualifying_time",
        "avg_qualifying_time",
        "avg_finish_position",
        "dnf_rate",
    ];

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [
            self.fastest_lap,
            self.compound,
            self.dnf,
            self.qualifying_time,
            self.avg_qualifying_time,
            self.avg_finish_position,
            self.dnf_rate,
        ]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// Every feature must be a finite number
    fn check(&self, code: &CompetitorCode) -> Result<()> {
        for (name, value) in Self::NAMES.iter().zip(self.to_array()) {
            if !value.is_finite() {
                return Err(PodiumError::InvalidData(format!(
                    "feature {} for {} is not a finite number ({})",
                    name, code, value
                )));
            }
        }
        Ok(())
    }
}

/// A current-event competitor with their trend record, if any (left join)
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    pub code: CompetitorCode,
    pub qualifying_time: f64,
    pub trend: Option<TrendRecord>,
}

/// Current field split by presence in the historical event
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub known: Vec<MergedEntry>,
    pub new: Vec<MergedEntry>,
}

/// Attach trend records to qualifying rows, keeping qualifying order
pub fn merge_trends(
    qualifying: &[QualifyingEntry],
    trends: &HashMap<CompetitorCode, TrendRecord>,
) -> Vec<MergedEntry> {
    qualifying
        .iter()
        .map(|q| MergedEntry {
            code: q.code.clone(),
            qualifying_time: q.qualifying_time,
            trend: trends.get(&q.code).cloned(),
        })
        .collect()
}

/// Every entry lands in exactly one of known/new
pub fn partition(merged: Vec<MergedEntry>, historical: &EventFeatures) -> Partition {
    let (known, new): (Vec<MergedEntry>, Vec<MergedEntry>) = merged
        .into_iter()
        .partition(|entry| historical.contains(&entry.code));
    Partition { known, new }
}

/// Stand-in historical values for competitors absent from the historical event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationFallback {
    /// Mean fastest lap across the historical field
    pub fastest_lap: f64,
    /// Most common encoded compound; ties go to the lowest code
    pub compound: usize,
    /// New competitors are assumed to finish
    pub dnf: bool,
}

impl PopulationFallback {
    /// `None` when the historical event has no records
    pub fn from_event(historical: &EventFeatures, encoder: &CompoundEncoder) -> Option<Self> {
        let records = historical.records();
        if records.is_empty() {
            return None;
        }

        let fastest_lap =
            records.iter().map(|r| r.fastest_lap).sum::<f64>() / records.len() as f64;

        let mut codes: Vec<usize> = records
            .iter()
            .filter_map(|r| encoder.encode(&r.compound))
            .collect();
        codes.sort_unstable();
        let compound = mode(codes)?;

        Some(PopulationFallback {
            fastest_lap,
            compound,
            dnf: false,
        })
    }
}

/// Window-wide means of each trend field, used for imputation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrendFallback {
    pub avg_qualifying_time: Option<f64>,
    pub avg_finish_position: Option<f64>,
    pub dnf_rate: Option<f64>,
}

impl TrendFallback {
    pub fn from_trends(trends: &HashMap<CompetitorCode, TrendRecord>) -> Self {
        fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
            let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            (n > 0).then(|| sum / n as f64)
        }

        TrendFallback {
            avg_qualifying_time: mean(trends.values().filter_map(|t| t.avg_qualifying_time)),
            avg_finish_position: mean(trends.values().filter_map(|t| t.avg_finish_position)),
            dnf_rate: mean(trends.values().filter_map(|t| t.dnf_rate)),
        }
    }
}

/// Trend features with every gap resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTrend {
    pub avg_qualifying_time: f64,
    pub avg_finish_position: f64,
    pub dnf_rate: f64,
}

fn resolve_field(
    code: &CompetitorCode,
    name: &str,
    value: Option<f64>,
    fallback: Option<f64>,
    policy: MissingTrendPolicy,
) -> Result<f64> {
    match (value, policy) {
        (Some(v), _) => Ok(v),
        (None, MissingTrendPolicy::Fail) => Err(PodiumError::MissingTrend {
            code: code.clone(),
            reason: format!("no {} in the trend window", name),
        }),
        (None, MissingTrendPolicy::Impute) => match fallback {
            Some(f) => {
                log::warn!("{}: no {} in trend window, imputing {:.3}", code, name, f);
                Ok(f)
            }
            None => Err(PodiumError::MissingTrend {
                code: code.clone(),
                reason: format!(
                    "no {} in the trend window and no other competitor to impute it from",
                    name
                ),
            }),
        },
    }
}

/// Resolve a competitor's trend features under the given policy
pub fn resolve_trend(
    code: &CompetitorCode,
    trend: Option<&TrendRecord>,
    fallback: &TrendFallback,
    policy: MissingTrendPolicy,
) -> Result<ResolvedTrend> {
    let (quali, finish, dnf_rate) = match trend {
        Some(t) => (t.avg_qualifying_time, t.avg_finish_position, t.dnf_rate),
        None => {
            log::debug!("{} has no trend record", code);
            (None, None, None)
        }
    };

    Ok(ResolvedTrend {
        avg_qualifying_time: resolve_field(
            code,
            "average qualifying time",
            quali,
            fallback.avg_qualifying_time,
            policy,
        )?,
        avg_finish_position: resolve_field(
            code,
            "average finish position",
            finish,
            fallback.avg_finish_position,
            policy,
        )?,
        dnf_rate: resolve_field(code, "DNF rate", dnf_rate, fallback.dnf_rate, policy)?,
    })
}

/// A known competitor with its rank label
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub code: CompetitorCode,
    pub fastest_lap: f64,
    pub features: FeatureVector,
    /// Position when the known field is ordered by current qualifying time
    pub rank: usize,
}

/// A new competitor built from population fallbacks
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRow {
    pub code: CompetitorCode,
    pub fastest_lap: f64,
    pub features: FeatureVector,
}

/// Known rows (training and inference) and new rows (inference only)
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub known: Vec<TrainingRow>,
    pub new: Vec<InferenceRow>,
    pub encoder: CompoundEncoder,
    pub fallback: PopulationFallback,
}

impl FeatureTable {
    /// Build the table. Fails with `TrainingDataEmpty` when no current competitor
    /// appears in the historical event.
    pub fn build(
        historical: &EventFeatures,
        qualifying: &[QualifyingEntry],
        trends: &HashMap<CompetitorCode, TrendRecord>,
        policy: MissingTrendPolicy,
    ) -> Result<Self> {
        let merged = merge_trends(qualifying, trends);
        let Partition { known, new } = partition(merged, historical);
        if known.is_empty() {
            return Err(PodiumError::TrainingDataEmpty);
        }

        let encoder = CompoundEncoder::fit(historical.records().iter().map(|r| r.compound.as_str()));
        let fallback = PopulationFallback::from_event(historical, &encoder)
            .ok_or(PodiumError::TrainingDataEmpty)?;
        let trend_fallback = TrendFallback::from_trends(trends);

        // Inner join in historical order, then order by qualifying time
        let known_by_code: HashMap<&CompetitorCode, &MergedEntry> =
            known.iter().map(|e| (&e.code, e)).collect();
        let mut joined = Vec::with_capacity(known.len());
        for record in historical.records() {
            let Some(entry) = known_by_code.get(&record.code) else {
                continue;
            };
            let trend = resolve_trend(&record.code, entry.trend.as_ref(), &trend_fallback, policy)?;
            let compound = encoder.encode(&record.compound).ok_or_else(|| {
                PodiumError::InvalidData(format!("unencoded compound {}", record.compound))
            })?;

            let features = FeatureVector {
                fastest_lap: record.fastest_lap,
                compound: compound as f64,
                dnf: if record.dnf { 1.0 } else { 0.0 },
                qualifying_time: entry.qualifying_time,
                avg_qualifying_time: trend.avg_qualifying_time,
                avg_finish_position: trend.avg_finish_position,
                dnf_rate: trend.dnf_rate,
            };
            features.check(&record.code)?;
            joined.push((record.code.clone(), record.fastest_lap, features));
        }

        joined.sort_by(|a, b| a.2.qualifying_time.total_cmp(&b.2.qualifying_time));
        let known_rows: Vec<TrainingRow> = joined
            .into_iter()
            .enumerate()
            .map(|(i, (code, fastest_lap, features))| TrainingRow {
                code,
                fastest_lap,
                features,
                rank: i + 1,
            })
            .collect();

        let mut new_rows = Vec::with_capacity(new.len());
        for entry in &new {
            // No history and no recent form: nothing real to predict from
            let Some(record) = entry.trend.as_ref() else {
                return Err(PodiumError::MissingTrend {
                    code: entry.code.clone(),
                    reason: "new competitor has no trend record in the window".to_string(),
                });
            };
            let trend = resolve_trend(&entry.code, Some(record), &trend_fallback, policy)?;
            let features = FeatureVector {
                fastest_lap: fallback.fastest_lap,
                compound: fallback.compound as f64,
                dnf: if fallback.dnf { 1.0 } else { 0.0 },
                qualifying_time: entry.qualifying_time,
                avg_qualifying_time: trend.avg_qualifying_time,
                avg_finish_position: trend.avg_finish_position,
                dnf_rate: trend.dnf_rate,
            };
            features.check(&entry.code)?;
            new_rows.push(InferenceRow {
                code: entry.code.clone(),
                fastest_lap: fallback.fastest_lap,
                features,
            });
        }

        log::info!(
            "Feature table: {} known, {} new competitors",
            known_rows.len(),
            new_rows.len()
        );

        Ok(FeatureTable {
            known: known_rows,
            new: new_rows,
            encoder,
            fallback,
        })
    }

    /// Known feature vectors with their rank labels
    pub fn training_matrix(&self) -> (Vec<FeatureVector>, Vec<f64>) {
        self.known
            .iter()
            .map(|row| (row.features, row.rank as f64))
            .unzip()
    }

    pub fn new_features(&self) -> Vec<FeatureVector> {
        self.new.iter().map(|row| row.features).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::event::CompetitorRecord;

    fn record(code: &str, fastest_lap: f64, compound: &str) -> CompetitorRecord {
        CompetitorRecord {
            code: CompetitorCode::new(code),
            fastest_lap,
            compound: compound.to_string(),
            dnf: false,
            position: None,
        }
    }

    fn trend(code: &str, quali: Option<f64>, finish: Option<f64>, dnf: Option<f64>) -> TrendRecord {
        TrendRecord {
            code: CompetitorCode::new(code),
            avg_qualifying_time: quali,
            avg_finish_position: finish,
            dnf_rate: dnf,
            rounds: 1,
        }
    }

    fn trend_map(records: Vec<TrendRecord>) -> HashMap<CompetitorCode, TrendRecord> {
        records.into_iter().map(|t| (t.code.clone(), t)).collect()
    }

    fn historical() -> EventFeatures {
        EventFeatures::from_records(vec![
            record("B", 66.0, "HARD"),
            record("A", 65.0, "MEDIUM"),
        ])
    }

    fn qualifying() -> Vec<QualifyingEntry> {
        vec![
            QualifyingEntry::new("A", 60.0),
            QualifyingEntry::new("B", 61.0),
            QualifyingEntry::new("C", 62.0),
        ]
    }

    fn full_trends() -> HashMap<CompetitorCode, TrendRecord> {
        trend_map(vec![
            trend("A", Some(60.5), Some(2.0), Some(0.0)),
            trend("B", Some(61.5), Some(3.0), Some(0.25)),
            trend("C", Some(62.5), Some(9.0), Some(0.5)),
        ])
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let merged = merge_trends(&qualifying(), &HashMap::new());
        let Partition { known, new } = partition(merged, &historical());

        let known: Vec<_> = known.iter().map(|e| e.code.as_str()).collect();
        let new: Vec<_> = new.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(known, vec!["A", "B"]);
        assert_eq!(new, vec!["C"]);
    }

    #[test]
    fn test_known_rows_ranked_by_qualifying() {
        let table =
            FeatureTable::build(&historical(), &qualifying(), &full_trends(), MissingTrendPolicy::Fail)
                .unwrap();

        let ranked: Vec<_> = table.known.iter().map(|r| (r.code.as_str(), r.rank)).collect();
        assert_eq!(ranked, vec![("A", 1), ("B", 2)]);

        let (x, y) = table.training_matrix();
        assert_eq!(y, vec![1.0, 2.0]);
        assert_eq!(x[0].fastest_lap, 65.0);
        // HARD=0, MEDIUM=1
        assert_eq!(x[0].compound, 1.0);
        assert_eq!(x[1].compound, 0.0);
        assert_eq!(x[0].avg_finish_position, 2.0);
    }

    #[test]
    fn test_new_competitor_uses_population_fallback() {
        let table =
            FeatureTable::build(&historical(), &qualifying(), &full_trends(), MissingTrendPolicy::Fail)
                .unwrap();

        assert_eq!(table.new.len(), 1);
        let c = &table.new[0];
        assert_eq!(c.code.as_str(), "C");
        assert_eq!(c.fastest_lap, (65.0 + 66.0) / 2.0);
        // HARD and MEDIUM tie; the lower code wins
        assert_eq!(c.features.compound, 0.0);
        assert_eq!(c.features.dnf, 0.0);
        assert_eq!(c.features.qualifying_time, 62.0);
        assert_eq!(c.features.avg_finish_position, 9.0);
    }

    #[test]
    fn test_ties_in_qualifying_keep_historical_order() {
        let quali = vec![QualifyingEntry::new("A", 61.0), QualifyingEntry::new("B", 61.0)];
        let table =
            FeatureTable::build(&historical(), &quali, &full_trends(), MissingTrendPolicy::Fail)
                .unwrap();

        let ranked: Vec<_> = table.known.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(ranked, vec!["B", "A"]);
    }

    #[test]
    fn test_missing_trend_fail_policy() {
        let trends = trend_map(vec![trend("A", Some(60.5), Some(2.0), Some(0.0))]);
        let err = FeatureTable::build(&historical(), &qualifying(), &trends, MissingTrendPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, PodiumError::MissingTrend { .. }));
    }

    #[test]
    fn test_missing_trend_impute_policy() {
        let trends = trend_map(vec![
            trend("A", Some(60.0), Some(2.0), Some(0.0)),
            trend("B", Some(62.0), None, Some(0.5)),
            trend("C", None, Some(9.0), None),
        ]);
        let table =
            FeatureTable::build(&historical(), &qualifying(), &trends, MissingTrendPolicy::Impute)
                .unwrap();

        let b = table.known.iter().find(|r| r.code.as_str() == "B").unwrap();
        assert_eq!(b.features.avg_finish_position, 5.5);

        let c = &table.new[0];
        assert_eq!(c.features.avg_qualifying_time, 61.0);
        assert_eq!(c.features.avg_finish_position, 9.0);
        assert_eq!(c.features.dnf_rate, 0.25);
    }

    #[test]
    fn test_new_competitor_without_trend_record_fails() {
        let trends = trend_map(vec![
            trend("A", Some(60.0), Some(2.0), Some(0.0)),
            trend("B", Some(62.0), Some(3.0), Some(0.5)),
        ]);
        for policy in [MissingTrendPolicy::Impute, MissingTrendPolicy::Fail] {
            let err = FeatureTable::build(&historical(), &qualifying(), &trends, policy).unwrap_err();
            match err {
                PodiumError::MissingTrend { code, .. } => assert_eq!(code.as_str(), "C"),
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_empty_trend_window_cannot_be_imputed() {
        let err = FeatureTable::build(
            &historical(),
            &qualifying(),
            &HashMap::new(),
            MissingTrendPolicy::Impute,
        )
        .unwrap_err();
        assert!(matches!(err, PodiumError::MissingTrend { .. }));
    }

    #[test]
    fn test_no_known_competitors() {
        let quali = vec![QualifyingEntry::new("X", 60.0)];
        let err = FeatureTable::build(&historical(), &quali, &full_trends(), MissingTrendPolicy::Impute)
            .unwrap_err();
        assert!(matches!(err, PodiumError::TrainingDataEmpty));
    }
}
