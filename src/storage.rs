//! SQLite cache for parsed usage data.
//!
//! The cache exists so repeated scans skip log files that were already fully
//! processed. Usage records insert idempotently on the
//! `(timestamp, model, source_file)` key; duplicate keys are an idempotency
//! signal, absorbed and ignored. Sessions upsert wholesale by id: a later
//! scan replaces, never merges.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, ToSql};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, UsageError};
use crate::models::{SessionRecord, UsageRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS usage_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    model TEXT NOT NULL,
    multiplier REAL NOT NULL,
    is_premium INTEGER NOT NULL,
    initiator TEXT NOT NULL DEFAULT 'user',
    source_file TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    cached_tokens INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    session_id TEXT NOT NULL DEFAULT '',
    UNIQUE(timestamp, model, source_file)
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    start_time TEXT NOT NULL,
    end_time TEXT,
    models_used TEXT NOT NULL DEFAULT '',
    total_turns INTEGER NOT NULL DEFAULT 0,
    total_calls INTEGER NOT NULL DEFAULT 0,
    total_prompt_tokens INTEGER NOT NULL DEFAULT 0,
    total_completion_tokens INTEGER NOT NULL DEFAULT 0,
    total_cached_tokens INTEGER NOT NULL DEFAULT 0,
    total_duration_ms INTEGER NOT NULL DEFAULT 0,
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS parsed_files (
    filename TEXT PRIMARY KEY,
    parsed_at TEXT NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_usage_timestamp ON usage_records(timestamp);
CREATE INDEX IF NOT EXISTS idx_usage_model ON usage_records(model);
CREATE INDEX IF NOT EXISTS idx_usage_premium ON usage_records(is_premium);
CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
";

/// Embedded cache for parsed usage records and sessions.
pub struct UsageDb {
    conn: Connection,
}

impl UsageDb {
    /// Open or create the cache at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory cache, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Whether a log file has already been fully processed.
    pub fn is_file_parsed(&self, filename: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM parsed_files WHERE filename = ?1",
            params![filename],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Store a file's usage records and mark the file as parsed. Returns how
    /// many rows were actually inserted; re-submitting the same records
    /// inserts nothing.
    pub fn store_records(&self, records: &[UsageRecord], filename: &str) -> Result<usize> {
        let mut stored = 0;
        for r in records {
            stored += self.conn.execute(
                "INSERT OR IGNORE INTO usage_records
                   (timestamp, model, multiplier, is_premium, initiator, source_file,
                    prompt_tokens, completion_tokens, cached_tokens, duration_ms, session_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    r.timestamp,
                    r.model,
                    r.multiplier,
                    r.is_premium,
                    r.initiator,
                    r.source_file,
                    r.prompt_tokens as i64,
                    r.completion_tokens as i64,
                    r.cached_tokens as i64,
                    r.duration_ms as i64,
                    r.session_id,
                ],
            )?;
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO parsed_files (filename, parsed_at, record_count)
             VALUES (?1, ?2, ?3)",
            params![filename, Utc::now(), records.len() as i64],
        )?;

        debug!(filename, total = records.len(), stored, "stored usage records");
        Ok(stored)
    }

    /// Upsert session records by id. A re-submitted session replaces the
    /// stored row wholesale.
    pub fn store_sessions(&self, sessions: &[SessionRecord]) -> Result<usize> {
        let mut stored = 0;
        for s in sessions {
            stored += self.conn.execute(
                "INSERT OR REPLACE INTO sessions
                   (session_id, start_time, end_time, models_used, total_turns,
                    total_calls, total_prompt_tokens, total_completion_tokens,
                    total_cached_tokens, total_duration_ms, source_file)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    s.session_id,
                    s.start_time,
                    s.end_time,
                    s.models_used.join(","),
                    s.total_turns as i64,
                    s.total_calls as i64,
                    s.total_prompt_tokens as i64,
                    s.total_completion_tokens as i64,
                    s.total_cached_tokens as i64,
                    s.total_duration_ms as i64,
                    s.source_file,
                ],
            )?;
        }
        Ok(stored)
    }

    /// Query usage records ordered by timestamp, optionally bounded by a time
    /// range and filtered to premium-only.
    pub fn get_records(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        premium_only: bool,
    ) -> Result<Vec<UsageRecord>> {
        let mut sql = String::from("SELECT * FROM usage_records WHERE 1=1");
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(start) = start {
            sql.push_str(" AND timestamp >= ?");
            args.push(Box::new(start));
        }
        if let Some(end) = end {
            sql.push_str(" AND timestamp <= ?");
            args.push(Box::new(end));
        }
        if premium_only {
            sql.push_str(" AND is_premium = 1");
        }
        sql.push_str(" ORDER BY timestamp");

        let mut stmt = self.conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt.query_map(arg_refs.as_slice(), record_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(UsageError::from)
    }

    /// Query session records ordered by start time.
    pub fn get_sessions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SessionRecord>> {
        let mut sql = String::from("SELECT * FROM sessions WHERE 1=1");
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(start) = start {
            sql.push_str(" AND start_time >= ?");
            args.push(Box::new(start));
        }
        if let Some(end) = end {
            sql.push_str(" AND start_time <= ?");
            args.push(Box::new(end));
        }
        sql.push_str(" ORDER BY start_time");

        let mut stmt = self.conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt.query_map(arg_refs.as_slice(), session_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(UsageError::from)
    }

    pub fn record_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM usage_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn parsed_file_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM parsed_files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Drop all cached data ahead of a forced re-scan.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM usage_records", [])?;
        self.conn.execute("DELETE FROM parsed_files", [])?;
        self.conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        timestamp: row.get("timestamp")?,
        model: row.get("model")?,
        multiplier: row.get("multiplier")?,
        is_premium: row.get("is_premium")?,
        initiator: row.get("initiator")?,
        source_file: row.get("source_file")?,
        prompt_tokens: row.get::<_, i64>("prompt_tokens")? as u64,
        completion_tokens: row.get::<_, i64>("completion_tokens")? as u64,
        cached_tokens: row.get::<_, i64>("cached_tokens")? as u64,
        duration_ms: row.get::<_, i64>("duration_ms")? as u64,
        session_id: row.get("session_id")?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let models: String = row.get("models_used")?;
    Ok(SessionRecord {
        session_id: row.get("session_id")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        models_used: if models.is_empty() {
            Vec::new()
        } else {
            models.split(',').map(str::to_string).collect()
        },
        total_turns: row.get::<_, i64>("total_turns")? as u64,
        total_calls: row.get::<_, i64>("total_calls")? as u64,
        total_prompt_tokens: row.get::<_, i64>("total_prompt_tokens")? as u64,
        total_completion_tokens: row.get::<_, i64>("total_completion_tokens")? as u64,
        total_cached_tokens: row.get::<_, i64>("total_cached_tokens")? as u64,
        total_duration_ms: row.get::<_, i64>("total_duration_ms")? as u64,
        source_file: row.get("source_file")?,
    })
}
