//! Persisted model types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health classification of a monitor.
///
/// Used both for raw probe results and for the grace-adjusted visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Degraded,
    Down,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Degraded => "DEGRADED",
            Status::Down => "DOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Status::Up),
            "DEGRADED" => Ok(Status::Degraded),
            "DOWN" => Ok(Status::Down),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Last computed state of a monitor, one row per monitor.
///
/// Timestamps are Unix milliseconds. `first_fail_time` is `None` whenever
/// `fail_count` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub monitor_id: String,
    pub status: Status,
    pub last_checked_at: i64,
    pub last_latency: i64,
    pub fail_count: u32,
    pub first_fail_time: Option<i64>,
    pub last_error: Option<String>,
}

/// A single logged probe result. Carries the raw classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHistoryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub monitor_id: String,
    pub timestamp: i64,
    pub status: Status,
    pub latency: i64,
    pub message: Option<String>,
}
