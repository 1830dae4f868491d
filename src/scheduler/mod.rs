//! Scheduler that drives the status engine at a fixed cadence.

use crate::config::ConfigHandle;
use crate::engine::{CycleReport, StatusEngine};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

/// Runs one check cycle per tick. Cycles never overlap: a tick that fires
/// while a cycle is still running is skipped.
pub struct Scheduler {
    engine: Arc<StatusEngine>,
    config: Arc<ConfigHandle>,
    interval: Duration,
    cycle_timeout: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<StatusEngine>,
        config: Arc<ConfigHandle>,
        interval: Duration,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            config,
            interval,
            cycle_timeout,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler background task.
    pub async fn start(&self) {
        let (tx, mut rx) = broadcast::channel(1);
        {
            let mut stop_guard = self.stop.lock().await;
            if stop_guard.is_some() {
                return; // Already running
            }
            *stop_guard = Some(tx);
        }

        let engine = self.engine.clone();
        let config = self.config.clone();
        let cycle_timeout = self.cycle_timeout;
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            "Scheduler: running a cycle every {:?} (timeout {:?})",
            self.interval,
            cycle_timeout
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        // A stop signal abandons the cycle in flight.
                        tokio::select! {
                            _ = rx.recv() => break,
                            _ = run_once(&engine, &config, cycle_timeout) => {}
                        }
                    }
                }
            }
            tracing::info!("Scheduler: stopped");
        });
    }

    /// Stop the scheduler. An in-flight cycle is abandoned.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(());
        }
    }
}

/// Reload the configuration and run a single bounded cycle.
///
/// Returns `None` when the cycle hit `cycle_timeout`; evaluations still in
/// flight at that point are abandoned without writing.
pub async fn run_once(
    engine: &StatusEngine,
    config: &ConfigHandle,
    cycle_timeout: Duration,
) -> Option<CycleReport> {
    let snapshot = config.reload().await;

    match tokio::time::timeout(cycle_timeout, engine.run_cycle(snapshot)).await {
        Ok(report) => {
            for outcome in &report.outcomes {
                if let Some(t) = outcome.transition {
                    tracing::info!(
                        "{} changed {} -> {} (raw {}, notified: {})",
                        outcome.monitor_id,
                        t.from,
                        t.to,
                        outcome.raw_status,
                        outcome.notified
                    );
                }
                if !outcome.history_recorded {
                    tracing::debug!("No history recorded for {}", outcome.monitor_id);
                }
            }
            tracing::info!(
                "Cycle complete: {} evaluated, {} failed, {} skipped",
                report.outcomes.len(),
                report.failures.len(),
                report.skipped.len()
            );
            Some(report)
        }
        Err(_) => {
            tracing::error!("Cycle timed out after {:?}", cycle_timeout);
            None
        }
    }
}
