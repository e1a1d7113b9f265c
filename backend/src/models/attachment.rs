use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// File metadata bound to exactly one booking. Bytes live in the attachment store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Client-declared file description, handed to the attachment store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FileMetadata {
    #[validate(length(min = 1, max = 255, message = "file_name must be 1-255 characters"))]
    pub file_name: String,
    #[validate(length(min = 1, max = 127))]
    pub content_type: String,
    #[validate(range(min = 0))]
    pub size_bytes: i64,
    /// Handle of the already-uploaded blob (e.g. a pre-signed upload key).
    pub upload_ref: String,
}

/// What the attachment store reports back after accepting a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachFilesRequest {
    #[validate(length(min = 1, max = 10, message = "1-10 files per request"), nested)]
    pub files: Vec<FileMetadata>,
}
