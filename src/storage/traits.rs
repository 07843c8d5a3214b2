//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::model::Record;
use crate::storage::{RecordCounts, SessionRecord, SessionStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Write task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store backends
///
/// Methods are synchronous; the sink runs them on the blocking pool.
pub trait RecordStore: Send {
    // ===== Session Management =====

    /// Records the start of a harvest session
    fn begin_session(&mut self, session_id: &str) -> StorageResult<()>;

    /// Marks a session finished with its final counts
    fn finish_session(
        &mut self,
        session_id: &str,
        status: SessionStatus,
        counts: RecordCounts,
    ) -> StorageResult<()>;

    /// Gets a session by ID
    fn get_session(&self, session_id: &str) -> StorageResult<SessionRecord>;

    // ===== Records =====

    /// Removes every stored record
    fn clear(&mut self) -> StorageResult<()>;

    /// Writes a batch of records atomically, replacing any with the same identity
    fn insert_records(&mut self, records: &[Record]) -> StorageResult<()>;

    /// Returns every stored record in first-write order
    fn read_all(&self) -> StorageResult<Vec<Record>>;

    /// Counts stored records by kind
    fn count_records(&self) -> StorageResult<RecordCounts>;
}
