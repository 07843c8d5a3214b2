//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::model::Record;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{RecordCounts, SessionRecord, SessionStatus};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;

/// SQLite record store
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
    );
    record.published = row.get(3)?;
    record.likes = row.get(4)?;
    record.author_url = row.get(5)?;
    record.is_owner = row.get(6)?;
    record.is_member = row.get(7)?;
    record.member_label = row.get(8)?;

    let parent_id: Option<String> = row.get(9)?;
    Ok(match parent_id {
        Some(parent_id) => record.into_reply(parent_id),
        None => record,
    })
}

impl RecordStore for SqliteRecordStore {
    // ===== Session Management =====

    fn begin_session(&mut self, session_id: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (id, started_at, status) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET started_at = excluded.started_at,
                 status = excluded.status, finished_at = NULL",
            params![session_id, now, SessionStatus::Running.to_db_string()],
        )?;
        Ok(())
    }

    fn finish_session(
        &mut self,
        session_id: &str,
        status: SessionStatus,
        counts: RecordCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE sessions SET status = ?1, finished_at = ?2, main_count = ?3, reply_count = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                counts.main as i64,
                counts.replies as i64,
                session_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> StorageResult<SessionRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, status, main_count, reply_count
                 FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        status: SessionStatus::from_db_string(&row.get::<_, String>(3)?)
                            .unwrap_or(SessionStatus::Running),
                        counts: RecordCounts {
                            main: row.get::<_, i64>(4)? as u64,
                            replies: row.get::<_, i64>(5)? as u64,
                        },
                    })
                },
            )
            .map_err(|_| StorageError::SessionNotFound(session_id.to_string()))
    }

    // ===== Records =====

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM records", [])?;
        Ok(())
    }

    fn insert_records(&mut self, records: &[Record]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (id, author, text, published, likes, author_url, is_owner,
                     is_member, member_label, is_reply, parent_id, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     author = excluded.author,
                     text = excluded.text,
                     published = excluded.published,
                     likes = excluded.likes,
                     author_url = excluded.author_url,
                     is_owner = excluded.is_owner,
                     is_member = excluded.is_member,
                     member_label = excluded.member_label,
                     is_reply = excluded.is_reply,
                     parent_id = excluded.parent_id,
                     stored_at = excluded.stored_at",
            )?;

            for record in records {
                stmt.execute(params![
                    record.id,
                    record.author,
                    record.text,
                    record.published,
                    record.likes,
                    record.author_url,
                    record.is_owner,
                    record.is_member,
                    record.member_label,
                    record.is_reply(),
                    record.parent_id(),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn read_all(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, author, text, published, likes, author_url, is_owner, is_member,
                    member_label, parent_id
             FROM records ORDER BY seq",
        )?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_records(&self) -> StorageResult<RecordCounts> {
        let (main, replies): (i64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(is_reply = 0), 0), COALESCE(SUM(is_reply = 1), 0) FROM records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(RecordCounts {
            main: main as u64,
            replies: replies as u64,
        })
    }
}
