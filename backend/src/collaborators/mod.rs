//! Interfaces to the systems around the scheduler: resource profiles,
//! notification delivery, meeting-link provisioning and file storage.
//!
//! Notification and meeting-link calls are dispatched after commit and are
//! best-effort; their failures are logged and never reach the caller.

pub mod local;
pub mod profiles;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::attachment::{FileMetadata, StoredFile};

pub use local::{LogMeetingLinks, LogNotifier, MetadataOnlyAttachments};
pub use profiles::{PgProfiles, StaticProfiles};
pub use webhook::{WebhookMeetingLinks, WebhookNotifier};

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Configured `max_concurrent_sessions`, if any.
    async fn capacity(&self, resource_id: Uuid) -> anyhow::Result<Option<i32>>;
    /// Whether the user has a resource profile. Bookings binding a resource
    /// count against its capacity.
    async fn is_resource(&self, user_id: Uuid) -> anyhow::Result<bool>;
    async fn default_timezone(&self, user_id: Uuid) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    BookingCreated,
    BookingUpdated,
    BookingCancelled,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub recipients: Vec<Uuid>,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[async_trait]
pub trait MeetingLinkProvisioner: Send + Sync {
    async fn provision(&self, booking_id: Uuid, start_at: OffsetDateTime) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(&self, booking_id: Uuid, files: &[FileMetadata]) -> anyhow::Result<Vec<StoredFile>>;
}

/// Work handed to collaborators once a transaction has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Notify(Notification),
    ProvisionMeetingLink {
        booking_id: Uuid,
        start_at: OffsetDateTime,
    },
}

/// The set of outbound collaborators a `SchedulingService` dispatches to.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub meetings: Arc<dyn MeetingLinkProvisioner>,
    pub attachments: Arc<dyn AttachmentStore>,
}

impl Collaborators {
    /// Log-only notification and meeting-link delivery.
    pub fn local() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            meetings: Arc::new(LogMeetingLinks),
            attachments: Arc::new(MetadataOnlyAttachments),
        }
    }

    /// Spawns one task per effect. Failures are logged and dropped.
    pub fn dispatch(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::Notify(notification) => {
                    if notification.recipients.is_empty() {
                        continue;
                    }
                    let notifier = Arc::clone(&self.notifier);
                    tokio::spawn(async move {
                        if let Err(e) = notifier.notify(&notification).await {
                            tracing::warn!(
                                category = ?notification.category,
                                recipients = notification.recipients.len(),
                                "Notification dispatch failed: {:#}",
                                e
                            );
                        }
                    });
                }
                SideEffect::ProvisionMeetingLink {
                    booking_id,
                    start_at,
                } => {
                    let meetings = Arc::clone(&self.meetings);
                    tokio::spawn(async move {
                        if let Err(e) = meetings.provision(booking_id, start_at).await {
                            tracing::warn!(%booking_id, "Meeting link provisioning failed: {:#}", e);
                        }
                    });
                }
            }
        }
    }
}
