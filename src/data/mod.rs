//! Data ingestion and storage
//!
//! The session record source seam, SQLite storage, and qualifying input.

pub mod database;
pub mod qualifying;
pub mod source;

pub use database::{Database, SessionImport};
pub use qualifying::QualifyingEntry;
pub use source::{InMemorySource, LapRecord, ResultRecord, SessionRecordSource, SessionRecords};
