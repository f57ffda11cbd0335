//! SQLite storage for session records

use crate::data::source::{LapRecord, ResultRecord, SessionRecordSource, SessionRecords};
use crate::{CompetitorCode, FinishStatus, PodiumError, Result, RoundRef, SessionType};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One session's worth of records in the import file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionImport {
    pub season: u16,
    pub round: u32,
    pub name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub session: SessionType,
    #[serde(default)]
    pub laps: Vec<LapRecord>,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                season INTEGER NOT NULL,
                round INTEGER NOT NULL,
                name TEXT NOT NULL,
                date TEXT,
                UNIQUE(season, round)
            );

            CREATE TABLE IF NOT EXISTS laps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id),
                session TEXT NOT NULL,
                seq INTEGER NOT NULL,
                competitor TEXT NOT NULL,
                lap_number INTEGER,
                lap_time REAL,
                compound TEXT
            );

            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id),
                session TEXT NOT NULL,
                seq INTEGER NOT NULL,
                competitor TEXT NOT NULL,
                position INTEGER,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_name ON events(season, name);
            CREATE INDEX IF NOT EXISTS idx_laps_session ON laps(event_id, session);
            CREATE INDEX IF NOT EXISTS idx_results_session ON results(event_id, session);
            "#,
        )?;
        Ok(())
    }

    // ==================== Event Operations ====================

    /// Get or create an event, updating its name/date if they changed
    pub fn upsert_event(
        &self,
        season: u16,
        round: u32,
        name: &str,
        date: Option<NaiveDate>,
    ) -> Result<i64> {
        upsert_event(&self.conn, season, round, name, date)
    }

    /// Find an event id by round number or (case-insensitive) name
    pub fn find_event(&self, season: u16, round: &RoundRef) -> Result<Option<i64>> {
        let id = match round {
            RoundRef::Number(n) => self
                .conn
                .query_row(
                    "SELECT id FROM events WHERE season = ?1 AND round = ?2",
                    params![season, n],
                    |row| row.get(0),
                )
                .optional()?,
            RoundRef::Name(name) => self
                .conn
                .query_row(
                    "SELECT id FROM events WHERE season = ?1 AND LOWER(name) = ?2",
                    params![season, name.to_lowercase()],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(id)
    }

    // ==================== Session Operations ====================

    /// Store one session, replacing any records previously imported for it
    pub fn import_session(&mut self, import: &SessionImport) -> Result<usize> {
        let session = import.session.code();

        let tx = self.conn.transaction()?;
        let event_id = upsert_event(&tx, import.season, import.round, &import.name, import.date)?;
        tx.execute(
            "DELETE FROM laps WHERE event_id = ?1 AND session = ?2",
            params![event_id, session],
        )?;
        tx.execute(
            "DELETE FROM results WHERE event_id = ?1 AND session = ?2",
            params![event_id, session],
        )?;

        for (seq, lap) in import.laps.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO laps (event_id, session, seq, competitor, lap_number, lap_time, compound)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    event_id,
                    session,
                    seq as i64,
                    lap.competitor.as_str(),
                    lap.lap_number,
                    lap.lap_time,
                    lap.compound,
                ],
            )?;
        }

        for (seq, result) in import.results.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO results (event_id, session, seq, competitor, position, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    event_id,
                    session,
                    seq as i64,
                    result.competitor.as_str(),
                    result.position,
                    result.status.to_string(),
                ],
            )?;
        }
        tx.commit()?;

        log::debug!(
            "Imported {} laps and {} results for {} {} ({})",
            import.laps.len(),
            import.results.len(),
            import.season,
            import.name,
            import.session
        );

        Ok(import.laps.len() + import.results.len())
    }

    /// Read an import file and store it
    pub fn import_file<P: AsRef<Path>>(&mut self, path: P) -> Result<SessionImport> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let import: SessionImport = serde_json::from_str(&content)?;
        self.import_session(&import)?;
        Ok(import)
    }

    fn load_session(&self, event_id: i64, session: SessionType) -> Result<SessionRecords> {
        let mut stmt = self.conn.prepare(
            "SELECT competitor, lap_number, lap_time, compound
             FROM laps
             WHERE event_id = ?1 AND session = ?2
             ORDER BY seq",
        )?;
        let laps = stmt
            .query_map(params![event_id, session.code()], |row| {
                let competitor: String = row.get(0)?;
                Ok(LapRecord {
                    competitor: CompetitorCode::new(&competitor),
                    lap_number: row.get(1)?,
                    lap_time: row.get(2)?,
                    compound: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT competitor, position, status
             FROM results
             WHERE event_id = ?1 AND session = ?2
             ORDER BY seq",
        )?;
        let results = stmt
            .query_map(params![event_id, session.code()], |row| {
                let competitor: String = row.get(0)?;
                let status: String = row.get(2)?;
                Ok(ResultRecord {
                    competitor: CompetitorCode::new(&competitor),
                    position: row.get(1)?,
                    status: FinishStatus::parse(&status),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SessionRecords { laps, results })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let event_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

        let lap_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM laps", [], |row| row.get(0))?;

        let result_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;

        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT season FROM events ORDER BY season")?;
        let seasons = stmt
            .query_map([], |row| row.get::<_, u16>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(DatabaseStats {
            event_count: event_count as usize,
            lap_count: lap_count as usize,
            result_count: result_count as usize,
            seasons,
        })
    }
}

impl SessionRecordSource for Database {
    fn get_records(
        &self,
        season: u16,
        round: &RoundRef,
        session: SessionType,
    ) -> Result<SessionRecords> {
        let event_id = self
            .find_event(season, round)?
            .ok_or_else(|| PodiumError::EventNotFound {
                season,
                round: round.clone(),
            })?;

        let records = self.load_session(event_id, session)?;
        if records.laps.is_empty() && records.results.is_empty() {
            return Err(PodiumError::Retrieval {
                season,
                round: round.clone(),
                session,
                message: "no records stored for this session".to_string(),
            });
        }
        Ok(records)
    }
}

fn upsert_event(
    conn: &Connection,
    season: u16,
    round: u32,
    name: &str,
    date: Option<NaiveDate>,
) -> Result<i64> {
    let date_str = date.map(|d| d.format("%Y-%m-%d").to_string());
    conn.execute(
        r#"
        INSERT INTO events (season, round, name, date) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(season, round) DO UPDATE SET
            name = excluded.name,
            date = COALESCE(excluded.date, date)
        "#,
        params![season, round, name, date_str],
    )?;

    let id = conn.query_row(
        "SELECT id FROM events WHERE season = ?1 AND round = ?2",
        params![season, round],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub event_count: usize,
    pub lap_count: usize,
    pub result_count: usize,
    pub seasons: Vec<u16>,
}
