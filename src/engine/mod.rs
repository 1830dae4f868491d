//! Status engine: one evaluation cycle across all configured monitors.
//!
//! Each monitor is evaluated in its own task. A failing evaluation is
//! captured in the `CycleReport` and never affects its siblings.

mod locks;
mod reconcile;

pub use locks::*;
pub use reconcile::*;

use crate::config::{Monitor, Settings, StatusConfig};
use crate::db::{CheckHistoryEntry, DbError, StateStore, Status};
use crate::notify::Notifier;
use crate::probe::{Probe, ProbeError};

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Message sent when a transition carries no diagnostic.
const DEFAULT_NOTIFY_MESSAGE: &str = "Status Changed";

/// Errors that abort the evaluation of a single monitor.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("failed to persist state: {0}")]
    Store(#[from] DbError),
    #[error("evaluation task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
}

/// Result of a successful evaluation of one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub monitor_id: String,
    pub raw_status: Status,
    pub status: Status,
    pub transition: Option<Transition>,
    pub notified: bool,
    pub history_recorded: bool,
}

#[derive(Debug)]
pub struct MonitorFailure {
    pub monitor_id: String,
    pub error: EngineError,
}

/// Everything that happened during one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<MonitorOutcome>,
    pub failures: Vec<MonitorFailure>,
    /// Monitors whose previous evaluation was still in flight.
    pub skipped: Vec<String>,
}

impl CycleReport {
    pub fn outcome(&self, monitor_id: &str) -> Option<&MonitorOutcome> {
        self.outcomes.iter().find(|o| o.monitor_id == monitor_id)
    }
}

/// Collaborators shared by every evaluation task.
#[derive(Clone)]
struct Collaborators {
    store: Arc<dyn StateStore>,
    probe: Arc<dyn Probe>,
    notifier: Arc<dyn Notifier>,
}

pub struct StatusEngine {
    deps: Collaborators,
    locks: MonitorLocks,
}

impl StatusEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        probe: Arc<dyn Probe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            deps: Collaborators {
                store,
                probe,
                notifier,
            },
            locks: MonitorLocks::default(),
        }
    }

    /// Evaluate every monitor in `config` concurrently.
    ///
    /// Dropping the returned future aborts evaluations that have not finished;
    /// monitors that already completed keep their writes.
    pub async fn run_cycle(&self, config: Arc<StatusConfig>) -> CycleReport {
        let mut report = CycleReport::default();
        let mut pending = HashSet::new();
        let mut tasks = JoinSet::new();

        self.locks
            .retain(&config.monitors().map(|m| m.id.as_str()).collect());

        for monitor in config.monitors() {
            let Some(guard) = self.locks.try_acquire(&monitor.id) else {
                tracing::warn!("Skipping {}: previous evaluation still running", monitor.id);
                report.skipped.push(monitor.id.clone());
                continue;
            };

            pending.insert(monitor.id.clone());
            let deps = self.deps.clone();
            let config = config.clone();
            let monitor = monitor.clone();

            tasks.spawn(async move {
                let _guard = guard;
                let result = evaluate(&deps, &config.settings, &monitor).await;
                (monitor.id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((monitor_id, result)) => {
                    pending.remove(&monitor_id);
                    match result {
                        Ok(outcome) => report.outcomes.push(outcome),
                        Err(error) => {
                            tracing::error!("Evaluation of {} failed: {}", monitor_id, error);
                            report.failures.push(MonitorFailure { monitor_id, error });
                        }
                    }
                }
                Err(e) => tracing::error!("Evaluation task failed: {}", e),
            }
        }

        // Tasks that panicked never reported their id.
        for monitor_id in pending {
            report.failures.push(MonitorFailure {
                monitor_id,
                error: EngineError::Join("task panicked or was cancelled".to_string()),
            });
        }

        report
    }
}

/// Evaluate one monitor. Nothing is written unless the probe returned a result.
async fn evaluate(
    deps: &Collaborators,
    settings: &Settings,
    monitor: &Monitor,
) -> Result<MonitorOutcome, EngineError> {
    // A failed read falls back to a fresh evaluation, which resets the grace counter.
    let prior = match deps.store.get_state(&monitor.id) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("Could not read state for {}, treating as fresh: {}", monitor.id, e);
            None
        }
    };

    tracing::info!("Checking {} ({})...", monitor.id, monitor.url);
    let result = deps.probe.check(monitor).await?;
    let now = Utc::now().timestamp_millis();
    tracing::info!(
        "Result for {}: {}, Latency: {}ms, Msg: {}",
        monitor.id,
        result.status,
        result.latency,
        result.message.as_deref().unwrap_or("-")
    );

    let state = reconcile(monitor, prior.as_ref(), &result, now);
    deps.store.upsert_state(&state)?;

    let mut history_recorded = false;
    if monitor.display.history {
        let entry = CheckHistoryEntry {
            id: None,
            monitor_id: monitor.id.clone(),
            timestamp: now,
            status: result.status,
            latency: result.latency,
            message: result.message.clone(),
        };
        match deps.store.append_history(&entry) {
            Ok(()) => history_recorded = true,
            Err(e) => tracing::error!("Failed to append history for {}: {}", monitor.id, e),
        }
    }

    let prior_status = prior.as_ref().map(|p| p.status);
    let transition = prior_status
        .filter(|from| *from != state.status)
        .map(|from| Transition {
            from,
            to: state.status,
        });

    let mut notified = false;
    if should_notify(settings.notification_policy(), prior_status, state.status) {
        let message = result.message.as_deref().unwrap_or(DEFAULT_NOTIFY_MESSAGE);
        match deps
            .notifier
            .send(settings, monitor, state.status, message)
            .await
        {
            Ok(()) => notified = true,
            Err(e) => tracing::error!("Failed to notify for {}: {}", monitor.id, e),
        }
    }

    Ok(MonitorOutcome {
        monitor_id: monitor.id.clone(),
        raw_status: result.status,
        status: state.status,
        transition,
        notified,
        history_recorded,
    })
}
