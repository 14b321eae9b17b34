//! Response DTOs for the HTTP API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::file::FileRecord;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// A stored file as shown to clients.
///
/// The on-disk name is deliberately absent.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    /// File ID.
    pub id: i64,
    /// Filename as uploaded.
    pub original_name: String,
    /// Upload time (RFC 3339).
    pub upload_date: DateTime<Utc>,
    /// Download count.
    pub downloads: i64,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name,
            upload_date: record.upload_date,
            downloads: record.downloads,
        }
    }
}

/// Upload result.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// ID of the new file.
    pub id: i64,
    /// Status message.
    pub message: String,
}

/// Plain status message.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Status message.
    pub message: String,
}

impl MessageResponse {
    /// Create a new message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
