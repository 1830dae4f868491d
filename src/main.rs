//! uptrail - uptime monitor and public status page
//!
//! Probes the configured HTTP and TCP targets once per cycle, keeps the
//! grace-adjusted status and check history in SQLite, and notifies on
//! status transitions.

mod config;
mod db;
mod engine;
mod notify;
mod probe;
mod scheduler;
mod view;
mod web;

use config::{ConfigHandle, ServerConfig};
use db::Store;
use engine::StatusEngine;
use notify::{EmailNotifier, NotifierSet, WebhookNotifier};
use probe::NetworkProbe;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting uptrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    let status_config = Arc::new(ConfigHandle::load(&cfg.config_path)?);
    let monitor_count = status_config.snapshot().await.monitors().count();
    tracing::info!("Loaded {} monitors from {}", monitor_count, cfg.config_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Notification channels
    let mut notifier = NotifierSet::new().with(WebhookNotifier::new(NOTIFY_TIMEOUT)?);
    if let Some(resend) = cfg.resend.clone() {
        tracing::info!("Email notifications enabled for {}", resend.to);
        notifier = notifier.with(EmailNotifier::new(resend, NOTIFY_TIMEOUT)?);
    }

    let engine = Arc::new(StatusEngine::new(
        store.clone(),
        Arc::new(NetworkProbe::default()),
        Arc::new(notifier),
    ));

    // Start scheduler
    let scheduler = Scheduler::new(
        engine,
        status_config.clone(),
        cfg.check_interval,
        cfg.cycle_timeout,
    );
    scheduler.start().await;

    // Start web server
    let server = Server::new(&cfg, store, status_config);
    let result = server.start().await;

    scheduler.stop().await;
    result
}
