//! Email notifications through the Resend HTTP API.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{Notifier, NotifyError};
use crate::config::{Monitor, ResendConfig, Settings};
use crate::db::Status;
use crate::view::escape_html;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
}

pub struct EmailNotifier {
    client: reqwest::Client,
    config: ResendConfig,
    endpoint: String,
}

impl EmailNotifier {
    pub fn new(config: ResendConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            endpoint: RESEND_ENDPOINT.to_string(),
        })
    }
}

fn subject(settings: &Settings, monitor: &Monitor, status: Status) -> String {
    format!("[{}] {} is {}", settings.title, monitor.name, status)
}

fn html_body(monitor: &Monitor, status: Status, message: &str) -> String {
    format!(
        "<p><strong>{}</strong> ({}) changed status to <strong>{}</strong>.</p><p>{}</p>",
        escape_html(&monitor.name),
        escape_html(&monitor.id),
        status,
        escape_html(message)
    )
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(
        &self,
        settings: &Settings,
        monitor: &Monitor,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError> {
        let request = EmailRequest {
            from: &self.config.from,
            to: [self.config.to.as_str()],
            subject: subject(settings, monitor, status),
            html: html_body(monitor, status, message),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                channel: "email",
                status: response.status().as_u16(),
            });
        }

        tracing::info!("Email sent for {} ({})", monitor.id, status);
        Ok(())
    }
}
