//! Storage module for persisting harvested records
//!
//! This module handles:
//! - SQLite schema management
//! - Record persistence keyed by identity
//! - Session tracking
//! - The durable sink: fire-and-forget writes with a completion barrier

mod schema;
mod sink;
mod sqlite;
mod traits;

pub use sink::{DurableSink, PendingWriteSet, WriteHandle};
pub use sqlite::SqliteRecordStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use std::path::Path;

/// Opens (or creates) the record database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteRecordStore> {
    SqliteRecordStore::new(path)
}

/// Aggregate record counts, split by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub main: u64,
    pub replies: u64,
}

impl RecordCounts {
    pub fn total(&self) -> u64 {
        self.main + self.replies
    }
}

/// Represents a harvest session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: SessionStatus,
    pub counts: RecordCounts,
}

/// Status of a harvest session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    /// Completed through the fallback extractor
    Degraded,
    Empty,
}

impl SessionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Degraded => "degraded",
            Self::Empty => "empty",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "degraded" => Some(Self::Degraded),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}
