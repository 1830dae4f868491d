//! Probe module for health checks.
//!
//! Supports HTTP and TCP probes. Network failures are reported as a DOWN
//! `CheckResult`; only an unusable monitor definition is returned as an error.

mod http;
mod tcp;

pub use http::*;
pub use tcp::*;

use crate::config::{Monitor, MonitorKind};
use crate::db::Status;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to build client: {0}")]
    Client(String),
}

/// Classified outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: Status,
    /// Latency in milliseconds.
    pub latency: i64,
    pub message: Option<String>,
}

impl CheckResult {
    pub fn up(latency: i64) -> Self {
        Self {
            status: Status::Up,
            latency,
            message: None,
        }
    }

    pub fn down(latency: i64, message: impl Into<String>) -> Self {
        Self {
            status: Status::Down,
            latency,
            message: Some(message.into()),
        }
    }
}

/// Performs one health check for a monitor.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, monitor: &Monitor) -> Result<CheckResult, ProbeError>;
}

/// Probe that talks to the network according to the monitor type.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    max_jitter: Duration,
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self {
            max_jitter: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn check(&self, monitor: &Monitor) -> Result<CheckResult, ProbeError> {
        // Add jitter to avoid thundering herd
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms > 0 {
            let jitter = rand::random::<u64>() % jitter_ms;
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        match monitor.kind {
            MonitorKind::Http => run_http_probe(monitor).await,
            MonitorKind::Tcp => run_tcp_probe(monitor).await,
        }
    }
}

/// Downgrade a passing probe to DEGRADED when it was slower than expected.
pub fn classify_latency(latency: i64, expected_latency: u64) -> CheckResult {
    if expected_latency > 0 && latency > expected_latency as i64 {
        CheckResult {
            status: Status::Degraded,
            latency,
            message: Some(format!(
                "High latency: {}ms (expected < {}ms)",
                latency, expected_latency
            )),
        }
    } else {
        CheckResult::up(latency)
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}
