use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{AttachmentStore, MeetingLinkProvisioner, Notification, NotificationDispatcher};
use crate::models::attachment::{FileMetadata, StoredFile};

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            category = ?notification.category,
            recipients = ?notification.recipients,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

pub struct LogMeetingLinks;

#[async_trait]
impl MeetingLinkProvisioner for LogMeetingLinks {
    async fn provision(&self, booking_id: Uuid, start_at: OffsetDateTime) -> anyhow::Result<()> {
        tracing::info!(%booking_id, %start_at, "Meeting link requested");
        Ok(())
    }
}

/// Accepts already-uploaded blobs by reference and keys them under the booking.
pub struct MetadataOnlyAttachments;

#[async_trait]
impl AttachmentStore for MetadataOnlyAttachments {
    async fn store(&self, booking_id: Uuid, files: &[FileMetadata]) -> anyhow::Result<Vec<StoredFile>> {
        Ok(files
            .iter()
            .map(|f| StoredFile {
                file_name: f.file_name.clone(),
                content_type: f.content_type.clone(),
                size_bytes: f.size_bytes,
                storage_key: format!("bookings/{}/{}", booking_id, f.upload_ref),
            })
            .collect())
    }
}
