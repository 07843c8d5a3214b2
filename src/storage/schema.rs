//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Thread-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest sessions
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    main_count INTEGER NOT NULL DEFAULT 0,
    reply_count INTEGER NOT NULL DEFAULT 0
);

-- Harvested records, keyed by identity
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    author TEXT NOT NULL,
    text TEXT NOT NULL,
    published TEXT NOT NULL,
    likes TEXT NOT NULL,
    author_url TEXT NOT NULL,
    is_owner INTEGER NOT NULL DEFAULT 0,
    is_member INTEGER NOT NULL DEFAULT 0,
    member_label TEXT NOT NULL,
    is_reply INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
