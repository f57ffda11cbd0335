//! Current-event qualifying input

use crate::{CompetitorCode, PodiumError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// One row of qualifying input: who, and their qualifying time in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifyingEntry {
    #[serde(rename = "Driver", alias = "driver", alias = "competitor")]
    pub code: CompetitorCode,
    #[serde(rename = "QualiTime", alias = "quali_time", alias = "qualifying_time")]
    pub qualifying_time: f64,
}

impl QualifyingEntry {
    pub fn new(code: &str, qualifying_time: f64) -> Self {
        QualifyingEntry {
            code: CompetitorCode::new(code),
            qualifying_time,
        }
    }
}

/// Load qualifying rows from a CSV file with a `Driver,QualiTime` header
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<QualifyingEntry>> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| {
        PodiumError::Config(format!(
            "Failed to open qualifying file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    read_csv(file)
}

/// Parse qualifying rows from any CSV reader and validate them
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<QualifyingEntry>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut entries = Vec::new();
    for row in reader.deserialize() {
        entries.push(row?);
    }

    validate(&entries)?;
    Ok(entries)
}

/// Competitor codes must be unique and every time finite and positive
pub fn validate(entries: &[QualifyingEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(&entry.code) {
            return Err(PodiumError::DuplicateCompetitor(entry.code.clone()));
        }
        if !entry.qualifying_time.is_finite() || entry.qualifying_time <= 0.0 {
            return Err(PodiumError::InvalidData(format!(
                "qualifying time for {} must be a positive number of seconds, got {}",
                entry.code, entry.qualifying_time
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv() {
        let data = "Driver,QualiTime\nver,64.314\n NOR , 64.718\n";
        let entries = read_csv(data.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], QualifyingEntry::new("VER", 64.314));
        assert_eq!(entries[1].code.as_str(), "NOR");
    }

    #[test]
    fn test_read_csv_alternate_headers() {
        let data = "competitor,qualifying_time\nLEC,64.9\n";
        let entries = read_csv(data.as_bytes()).unwrap();
        assert_eq!(entries[0].qualifying_time, 64.9);
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let data = "Driver,QualiTime\nVER,64.3\nver,64.5\n";
        assert!(matches!(
            read_csv(data.as_bytes()),
            Err(PodiumError::DuplicateCompetitor(code)) if code.as_str() == "VER"
        ));
    }

    #[test]
    fn test_invalid_time_rejected() {
        let entries = vec![QualifyingEntry::new("VER", -1.0)];
        assert!(matches!(validate(&entries), Err(PodiumError::InvalidData(_))));
    }

    #[test]
    fn test_load_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quali.csv");
        std::fs::write(&path, "Driver,QualiTime\nPIA,64.55\n").unwrap();

        let entries = load_csv(&path).unwrap();
        assert_eq!(entries, vec![QualifyingEntry::new("PIA", 64.55)]);
    }
}
