//! Notification delivery for status transitions.

mod email;
mod webhook;

pub use email::*;
pub use webhook::*;

use crate::config::{Monitor, Settings};
use crate::db::Status;

use async_trait::async_trait;
use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{channel} rejected notification with status {status}")]
    Rejected { channel: &'static str, status: u16 },
}

/// Delivers a status transition through some channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        settings: &Settings,
        monitor: &Monitor,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Fans a notification out to every configured channel.
#[derive(Default)]
pub struct NotifierSet {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: impl Notifier + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    /// Every channel is attempted; the first failure is returned.
    async fn send(
        &self,
        settings: &Settings,
        monitor: &Monitor,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError> {
        let mut first_err = None;

        for channel in &self.channels {
            if let Err(e) = channel.send(settings, monitor, status, message).await {
                tracing::error!("Notification for {} failed: {}", monitor.id, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Display, MonitorKind};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) fn settings() -> Settings {
        Settings {
            title: "Example Status".to_string(),
            logo: None,
            callback_url: None,
            callback_secret: None,
            notification_on_down_only: false,
            tags: vec![],
            summary_exclusion: vec![],
        }
    }

    pub(crate) fn monitor() -> Monitor {
        Monitor {
            id: "api".to_string(),
            name: "API".to_string(),
            kind: MonitorKind::Http,
            url: "https://api.example.com".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
            timeout: 5000,
            expected_latency: 1000,
            grace_period: 3,
            tags: vec![],
            display: Display::default(),
            validation: None,
        }
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        async fn send(&self, _: &Settings, _: &Monitor, _: Status, _: &str) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Rejected { channel: "test", status: 500 })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_set_attempts_every_channel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = NotifierSet::new()
            .with(Counting { calls: calls.clone(), fail: true })
            .with(Counting { calls: calls.clone(), fail: false });

        let result = set.send(&settings(), &monitor(), Status::Down, "Timeout").await;
        assert!(matches!(result, Err(NotifyError::Rejected { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_set_is_ok() {
        let set = NotifierSet::new();
        assert!(set.send(&settings(), &monitor(), Status::Up, "Status Changed").await.is_ok());
    }
}
