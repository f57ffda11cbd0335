//! Motorsport finishing-order prediction
//!
//! Builds a flat feature table from one historical event and a rolling window of
//! recent rounds, fits a gradient-boosted regressor on a rank proxy, and ranks the
//! field of an upcoming event, including competitors never seen before.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Short stable identifier for a competitor (e.g. "VER")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CompetitorCode(String);

impl CompetitorCode {
    pub fn new(code: &str) -> Self {
        CompetitorCode(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompetitorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for CompetitorCode {
    fn from(code: &str) -> Self {
        CompetitorCode::new(code)
    }
}

impl From<String> for CompetitorCode {
    fn from(code: String) -> Self {
        CompetitorCode::new(&code)
    }
}

impl From<CompetitorCode> for String {
    fn from(code: CompetitorCode) -> Self {
        code.0
    }
}

/// Phase of a round that produces lap and/or result records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionType {
    Qualifying,
    Race,
}

impl SessionType {
    pub fn code(&self) -> &'static str {
        match self {
            SessionType::Qualifying => "Q",
            SessionType::Race => "R",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "Q" | "QUALI" | "QUALIFYING" => Some(SessionType::Qualifying),
            "R" | "RACE" => Some(SessionType::Race),
            _ => None,
        }
    }
}

impl TryFrom<String> for SessionType {
    type Error = String;

    fn try_from(code: String) -> std::result::Result<Self, Self::Error> {
        SessionType::from_code(&code).ok_or_else(|| format!("Unknown session type: {}", code))
    }
}

impl From<SessionType> for String {
    fn from(session: SessionType) -> Self {
        session.code().to_string()
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Qualifying => write!(f, "Qualifying"),
            SessionType::Race => write!(f, "Race"),
        }
    }
}

/// A round addressed either by its sequential number or by event name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoundRef {
    Number(u32),
    Name(String),
}

impl RoundRef {
    /// Numeric strings become `Number`, anything else is treated as an event name
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<u32>() {
            Ok(n) => RoundRef::Number(n),
            Err(_) => RoundRef::Name(s.trim().to_string()),
        }
    }
}

impl fmt::Display for RoundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundRef::Number(n) => write!(f, "round {}", n),
            RoundRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// How a competitor's race ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishStatus {
    Finished,
    /// Classified but one or more laps down
    Lapped(u32),
    Disqualified,
    DidNotStart,
    Retired(String),
}

impl FinishStatus {
    /// Parse the free-text status found in timing data ("Finished", "+1 Lap", "Engine", ...)
    pub fn parse(status: &str) -> Self {
        let s = status.trim();
        let lower = s.to_lowercase();

        if lower == "finished" {
            return FinishStatus::Finished;
        }
        if let Some(rest) = lower.strip_prefix('+') {
            let laps = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok());
            if let (Some(laps), true) = (laps, rest.contains("lap")) {
                return FinishStatus::Lapped(laps);
            }
        }
        match lower.as_str() {
            "disqualified" | "dsq" => FinishStatus::Disqualified,
            "did not start" | "dns" => FinishStatus::DidNotStart,
            _ => FinishStatus::Retired(s.to_string()),
        }
    }

    /// Finished on the lead lap or classified laps down
    pub fn is_classified_finish(&self) -> bool {
        matches!(self, FinishStatus::Finished | FinishStatus::Lapped(_))
    }
}

impl From<String> for FinishStatus {
    fn from(status: String) -> Self {
        FinishStatus::parse(&status)
    }
}

impl From<FinishStatus> for String {
    fn from(status: FinishStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for FinishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishStatus::Finished => write!(f, "Finished"),
            FinishStatus::Lapped(1) => write!(f, "+1 Lap"),
            FinishStatus::Lapped(n) => write!(f, "+{} Laps", n),
            FinishStatus::Disqualified => write!(f, "Disqualified"),
            FinishStatus::DidNotStart => write!(f, "Did not start"),
            FinishStatus::Retired(reason) => write!(f, "{}", reason),
        }
    }
}

/// Whether a prediction came from a competitor seen in the historical event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Known,
    New,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Known => write!(f, "known"),
            Origin::New => write!(f, "new"),
        }
    }
}

/// One leaderboard entry; lower score means a better predicted finish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub code: CompetitorCode,
    pub fastest_lap: f64,
    pub predicted_score: f64,
    pub origin: Origin,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PodiumError {
    #[error("Failed to load {session} for season {season}, {round}: {message}")]
    Retrieval {
        season: u16,
        round: RoundRef,
        session: SessionType,
        message: String,
    },

    #[error("No event found for season {season}, {round}")]
    EventNotFound { season: u16, round: RoundRef },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Duplicate competitor in qualifying input: {0}")]
    DuplicateCompetitor(CompetitorCode),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No known competitors to train on: nobody in the qualifying input appears in the historical event")]
    TrainingDataEmpty,

    #[error("Missing trend data for {code}: {reason}")]
    MissingTrend { code: CompetitorCode, reason: String },

    #[error("Model not trained - call fit first")]
    NotTrained,
}

pub type Result<T> = std::result::Result<T, PodiumError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub event: EventConfig,
    pub history: HistoryConfig,
    pub trends: TrendsConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub imputation: ImputationConfig,
    pub data: DataConfig,
}

/// The upcoming event being predicted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub season: u16,
    pub round: u32,
    pub name: String,
}

/// The past event whose race data trains the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub season: u16,
    pub event: RoundRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsConfig {
    pub window_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationConfig {
    pub missing_trend: MissingTrendPolicy,
}

/// What to do when a competitor has no trend value for a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTrendPolicy {
    /// Fill with the mean of that field across the window's trend records
    Impute,
    /// Abort the run
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub qualifying_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            event: EventConfig {
                season: 2025,
                round: 11,
                name: "Austria".to_string(),
            },
            history: HistoryConfig {
                season: 2024,
                event: RoundRef::Name("Austria".to_string()),
            },
            trends: TrendsConfig { window_size: 4 },
            model: ModelConfig {
                n_estimators: 100,
                learning_rate: 0.1,
                max_depth: 3,
                min_samples_split: 2,
                min_samples_leaf: 1,
                seed: 42,
            },
            output: OutputConfig { top_k: 10 },
            imputation: ImputationConfig {
                missing_trend: MissingTrendPolicy::Impute,
            },
            data: DataConfig {
                database_path: "data/podium.db".to_string(),
                qualifying_path: "data/qualifying.csv".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PodiumError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PodiumError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PodiumError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competitor_code_normalized() {
        assert_eq!(CompetitorCode::new(" ver ").as_str(), "VER");
        assert_eq!(CompetitorCode::from("nor"), CompetitorCode::new("NOR"));
    }

    #[test]
    fn test_competitor_code_normalized_when_deserialized() {
        let code: CompetitorCode = serde_json::from_str("\" ham \"").unwrap();
        assert_eq!(code, CompetitorCode::new("HAM"));
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"HAM\"");
    }

    #[test]
    fn test_finish_status_parse() {
        assert_eq!(FinishStatus::parse("Finished"), FinishStatus::Finished);
        assert_eq!(FinishStatus::parse("+1 Lap"), FinishStatus::Lapped(1));
        assert_eq!(FinishStatus::parse("+2 Laps"), FinishStatus::Lapped(2));
        assert_eq!(FinishStatus::parse("DSQ"), FinishStatus::Disqualified);
        assert_eq!(
            FinishStatus::parse("Engine"),
            FinishStatus::Retired("Engine".to_string())
        );

        assert!(FinishStatus::parse("+1 Lap").is_classified_finish());
        assert!(!FinishStatus::parse("Collision").is_classified_finish());
    }

    #[test]
    fn test_round_ref_parse() {
        assert_eq!(RoundRef::parse("11"), RoundRef::Number(11));
        assert_eq!(RoundRef::parse("Austria"), RoundRef::Name("Austria".to_string()));
    }

    #[test]
    fn test_session_type_codes() {
        assert_eq!(SessionType::from_code("q"), Some(SessionType::Qualifying));
        assert_eq!(SessionType::from_code("Race"), Some(SessionType::Race));
        assert_eq!(SessionType::from_code("FP1"), None);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.trends.window_size, 4);
        assert_eq!(parsed.output.top_k, 10);
        assert_eq!(parsed.history.event, RoundRef::Name("Austria".to_string()));
        assert_eq!(parsed.imputation.missing_trend, MissingTrendPolicy::Impute);
    }
}
