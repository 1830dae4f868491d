//! SQLite database store implementation.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use super::StateStore;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("connection lock poisoned")]
    Poisoned,
}

impl ToSql for Status {
    fn to_sql(&self) -> SqlResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

const HISTORY_COLUMNS: &str = "id, monitor_id, timestamp, status, latency, message";

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

fn state_from_row(row: &Row<'_>) -> SqlResult<MonitorState> {
    Ok(MonitorState {
        monitor_id: row.get(0)?,
        status: row.get(1)?,
        last_checked_at: row.get(2)?,
        last_latency: row.get(3)?,
        fail_count: row.get(4)?,
        first_fail_time: row.get(5)?,
        last_error: row.get(6)?,
    })
}

fn history_from_row(row: &Row<'_>) -> SqlResult<CheckHistoryEntry> {
    Ok(CheckHistoryEntry {
        id: row.get(0)?,
        monitor_id: row.get(1)?,
        timestamp: row.get(2)?,
        status: row.get(3)?,
        latency: row.get(4)?,
        message: row.get(5)?,
    })
}

impl StateStore for Store {
    fn get_state(&self, monitor_id: &str) -> Result<Option<MonitorState>, DbError> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT monitor_id, status, last_checked_at, last_latency, fail_count, first_fail_time, last_error
                 FROM monitor_state WHERE monitor_id = ?1",
                params![monitor_id],
                state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    fn get_all_states(&self) -> Result<Vec<MonitorState>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT monitor_id, status, last_checked_at, last_latency, fail_count, first_fail_time, last_error
             FROM monitor_state",
        )?;
        let states = stmt
            .query_map([], state_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(states)
    }

    fn upsert_state(&self, state: &MonitorState) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO monitor_state (monitor_id, status, last_checked_at, last_latency, fail_count, first_fail_time, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(monitor_id) DO UPDATE SET
             status=excluded.status, last_checked_at=excluded.last_checked_at,
             last_latency=excluded.last_latency, fail_count=excluded.fail_count,
             first_fail_time=excluded.first_fail_time, last_error=excluded.last_error",
            params![
                state.monitor_id,
                state.status,
                state.last_checked_at,
                state.last_latency,
                state.fail_count,
                state.first_fail_time,
                state.last_error,
            ],
        )?;
        Ok(())
    }

    fn append_history(&self, entry: &CheckHistoryEntry) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO check_history (monitor_id, timestamp, status, latency, message) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.monitor_id,
                entry.timestamp,
                entry.status,
                entry.latency,
                entry.message,
            ],
        )?;
        Ok(())
    }

    fn get_history(&self, monitor_id: &str) -> Result<Vec<CheckHistoryEntry>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM check_history WHERE monitor_id = ?1 ORDER BY timestamp ASC, id ASC",
            HISTORY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![monitor_id], history_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_recent_history(&self, limit: u32) -> Result<Vec<CheckHistoryEntry>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM (
                 SELECT *, ROW_NUMBER() OVER (PARTITION BY monitor_id ORDER BY timestamp DESC, id DESC) AS rn
                 FROM check_history
             )
             WHERE rn <= ?1
             ORDER BY monitor_id ASC, timestamp ASC, id ASC",
            HISTORY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![limit], history_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(entries)
    }
}
