//! Webhook notifications posted to `settings.callback_url`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

use super::{Notifier, NotifyError};
use crate::config::{Monitor, Settings};
use crate::db::Status;

/// JSON body posted to the callback URL.
#[derive(Debug, Serialize)]
pub struct TransitionPayload<'a> {
    pub monitor_id: &'a str,
    pub monitor_name: &'a str,
    pub status: Status,
    pub message: &'a str,
    pub timestamp: i64,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        settings: &Settings,
        monitor: &Monitor,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError> {
        let Some(url) = settings.callback_url.as_deref() else {
            return Ok(());
        };

        let payload = TransitionPayload {
            monitor_id: &monitor.id,
            monitor_name: &monitor.name,
            status,
            message,
            timestamp: Utc::now().timestamp_millis(),
        };

        let mut request = self.client.post(url).json(&payload);
        if let Some(secret) = settings.callback_secret.as_deref() {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                channel: "webhook",
                status: response.status().as_u16(),
            });
        }

        tracing::info!("Webhook sent for {} ({})", monitor.id, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::{monitor, settings};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one request, answer with `status_line`, and hand back the raw request.
    async fn capture_one(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
        });

        (url, rx)
    }

    #[tokio::test]
    async fn test_skips_without_callback_url() {
        let notifier = WebhookNotifier::new(Duration::from_secs(1)).unwrap();
        let result = notifier.send(&settings(), &monitor(), Status::Down, "Timeout").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_posts_payload_with_secret() {
        let (url, rx) = capture_one("HTTP/1.1 204 No Content").await;
        let mut settings = settings();
        settings.callback_url = Some(url);
        settings.callback_secret = Some("s3cret".to_string());

        let notifier = WebhookNotifier::new(Duration::from_secs(2)).unwrap();
        notifier
            .send(&settings, &monitor(), Status::Down, "Timeout after 5000ms")
            .await
            .unwrap();

        let request = rx.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer s3cret"));
        assert!(request.contains(r#""status":"DOWN""#));
        assert!(request.contains(r#""monitor_id":"api""#));
    }

    #[tokio::test]
    async fn test_rejected_status_is_error() {
        let (url, _rx) = capture_one("HTTP/1.1 500 Internal Server Error").await;
        let mut settings = settings();
        settings.callback_url = Some(url);

        let notifier = WebhookNotifier::new(Duration::from_secs(2)).unwrap();
        let result = notifier.send(&settings, &monitor(), Status::Up, "Status Changed").await;
        assert!(matches!(result, Err(NotifyError::Rejected { status: 500, .. })));
    }
}
