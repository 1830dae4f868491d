//! Database module for uptrail.
//!
//! Provides the `StateStore` interface and its SQLite implementation.

mod models;
mod store;

pub use models::*;
pub use store::*;

/// Durable storage for monitor state and check history.
///
/// A single `upsert_state` must be atomic per monitor id.
pub trait StateStore: Send + Sync {
    fn get_state(&self, monitor_id: &str) -> Result<Option<MonitorState>, DbError>;
    fn get_all_states(&self) -> Result<Vec<MonitorState>, DbError>;
    /// Overwrite the whole row for `state.monitor_id`.
    fn upsert_state(&self, state: &MonitorState) -> Result<(), DbError>;
    fn append_history(&self, entry: &CheckHistoryEntry) -> Result<(), DbError>;
    /// Full history of one monitor, ascending by timestamp.
    fn get_history(&self, monitor_id: &str) -> Result<Vec<CheckHistoryEntry>, DbError>;
    /// Up to `limit` most recent entries per monitor, ascending by timestamp within each monitor.
    fn get_recent_history(&self, limit: u32) -> Result<Vec<CheckHistoryEntry>, DbError>;
}
