//! HTTP delivery of post-commit side effects to an external queue endpoint.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{MeetingLinkProvisioner, Notification, NotificationDispatcher};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

fn client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(WEBHOOK_TIMEOUT)
        .build()
        .context("Failed to build webhook HTTP client")
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("Notification webhook unreachable")?
            .error_for_status()
            .context("Notification webhook rejected request")?;
        Ok(())
    }
}

pub struct WebhookMeetingLinks {
    client: reqwest::Client,
    url: String,
}

impl WebhookMeetingLinks {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MeetingLinkProvisioner for WebhookMeetingLinks {
    async fn provision(&self, booking_id: Uuid, start_at: OffsetDateTime) -> anyhow::Result<()> {
        let start = start_at
            .format(&time::format_description::well_known::Rfc3339)
            .context("Unformattable start instant")?;
        self.client
            .post(&self.url)
            .json(&json!({ "booking_id": booking_id, "start_at": start }))
            .send()
            .await
            .context("Meeting-link webhook unreachable")?
            .error_for_status()
            .context("Meeting-link webhook rejected request")?;
        Ok(())
    }
}
