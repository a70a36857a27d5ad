use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::recorder::SessionRecorder;

/// One completed session as stored in the history database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: i64,
    pub completed_at: DateTime<Local>,
    pub duration_secs: u64,
    pub line_count: u64,
}

/// SQLite-backed history of completed sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database at the default location under the state directory.
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("voicetrainer_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                completed_at TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                line_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_lines (
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                line TEXT NOT NULL,
                PRIMARY KEY (session_id, position)
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            "#,
        )?;
        Ok(HistoryDb { conn })
    }

    /// Store a session and its lines in one transaction; returns the new id.
    pub fn record_session(
        &mut self,
        lines: &[String],
        duration_secs: u64,
        completed_at: DateTime<Local>,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (completed_at, duration_secs, line_count) VALUES (?1, ?2, ?3)",
            params![completed_at.to_rfc3339(), duration_secs, lines.len() as u64],
        )?;
        let session_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO session_lines (session_id, position, line) VALUES (?1, ?2, ?3)",
            )?;
            for (position, line) in lines.iter().enumerate() {
                stmt.execute(params![session_id, position as i64, line])?;
            }
        }

        tx.commit()?;
        Ok(session_id)
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, completed_at, duration_secs, line_count
            FROM sessions
            ORDER BY completed_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let completed_at: String = row.get(1)?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        1,
                        "completed_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(SessionSummary {
                id: row.get(0)?,
                completed_at,
                duration_secs: row.get(2)?,
                line_count: row.get(3)?,
            })
        })?;

        rows.collect()
    }

    /// Lines of one session in the order they were spoken.
    pub fn lines_for_session(&self, session_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT line FROM session_lines WHERE session_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map([session_id], |row| row.get(0))?;
        rows.collect()
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM session_lines; DELETE FROM sessions;")
    }

    /// Write every stored session as CSV; returns the number of rows written.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<usize> {
        let sessions = self.recent_sessions(usize::MAX >> 1)?;
        // The header is written even when there is nothing to export.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(["id", "completed_at", "duration_secs", "line_count"])?;
        for session in &sessions {
            writer.serialize(session)?;
        }
        writer.flush()?;
        Ok(sessions.len())
    }
}

impl SessionRecorder for HistoryDb {
    fn record(&mut self, lines_in_order: &[String], total_duration_secs: u64) {
        match self.record_session(lines_in_order, total_duration_secs, Local::now()) {
            Ok(id) => log::info!("saved session {} to history", id),
            Err(e) => log::error!("failed to save session history: {}", e),
        }
    }
}
