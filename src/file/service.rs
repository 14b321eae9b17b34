//! File service for depot.
//!
//! This module coordinates the blob store and the metadata store:
//! - Upload, streamed through a staging file, with retry on name collision
//! - Download with counting
//! - File listing and deletion
//!
//! A record is only ever inserted after its blob is on disk, and a blob is
//! removed before its record. The sweeper cleans up whatever a crash leaves
//! in between.

use bytes::Bytes;
use tokio::fs::File;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::{DepotError, Result};

use super::metadata::{FileRecord, FileRepository, NewFileRecord};
use super::naming::{extract_extension, NameGenerator};
use super::storage::{BlobStore, StagedBlob};
use super::{DEFAULT_MAX_UPLOAD_SIZE, MAX_NAME_ATTEMPTS};

/// Request data for file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Filename as supplied by the client.
    pub original_name: String,
    /// File content.
    pub content: Bytes,
}

impl UploadRequest {
    /// Create a new upload request.
    pub fn new(original_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            content: content.into(),
        }
    }
}

/// An open blob ready to be streamed to a client.
#[derive(Debug)]
pub struct Download {
    /// File metadata, as read before the counter was bumped.
    pub record: FileRecord,
    /// Open handle on the blob.
    pub file: File,
    /// Blob size in bytes.
    pub size: u64,
}

/// File service for managing uploads, downloads and deletions.
pub struct FileService<'a> {
    db: &'a Database,
    storage: &'a BlobStore,
    names: &'a dyn NameGenerator,
    max_upload_size: u64,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, storage: &'a BlobStore, names: &'a dyn NameGenerator) -> Self {
        Self {
            db,
            storage,
            names,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Create a new FileService with a custom max upload size.
    pub fn with_max_upload_size(mut self, max_size: u64) -> Self {
        self.max_upload_size = max_size;
        self
    }

    /// Reject an unusable client filename before any data is received.
    pub fn check_original_name(original_name: &str) -> Result<()> {
        if original_name.trim().is_empty() {
            return Err(DepotError::Validation("filename is required".to_string()));
        }
        Ok(())
    }

    /// Start receiving an upload, bounded by the configured size limit.
    pub async fn stage(&self) -> Result<StagedBlob> {
        self.storage.stage(self.max_upload_size).await
    }

    /// Upload a file held in memory.
    ///
    /// # Validation
    /// - Filename: must not be empty
    /// - File size: max configured size (default 1GB)
    ///
    /// # Returns
    /// The created file record.
    pub async fn upload(&self, request: &UploadRequest) -> Result<FileRecord> {
        Self::check_original_name(&request.original_name)?;

        if request.content.len() as u64 > self.max_upload_size {
            return Err(DepotError::TooLarge {
                limit: self.max_upload_size,
            });
        }

        let mut staged = self.stage().await?;
        staged.append(&request.content).await?;
        self.upload_staged(&request.original_name, staged).await
    }

    /// Publish a fully received upload under a fresh name and record it.
    ///
    /// Each attempt links the staged data under a new candidate name, so a
    /// collision never needs the upload to be sent again.
    pub async fn upload_staged(
        &self,
        original_name: &str,
        mut staged: StagedBlob,
    ) -> Result<FileRecord> {
        Self::check_original_name(original_name)?;

        let extension = extract_extension(original_name);
        let repo = FileRepository::new(self.db.pool());

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let generated_name = self.names.generate(&extension);

            match self.storage.commit(&mut staged, &generated_name).await {
                Ok(()) => {}
                Err(DepotError::Conflict(_)) => {
                    warn!(
                        generated_name = %generated_name,
                        attempt,
                        "Blob name already taken, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }

            let new_record = NewFileRecord::new(original_name, &generated_name);
            match repo.create(&new_record).await {
                Ok(record) => {
                    info!(
                        file_id = record.id,
                        generated_name = %record.generated_name,
                        size = staged.size(),
                        "File uploaded"
                    );
                    return Ok(record);
                }
                Err(DepotError::Conflict(_)) => {
                    warn!(
                        generated_name = %generated_name,
                        attempt,
                        "Generated name already recorded, retrying"
                    );
                    self.discard_blob(&generated_name).await;
                }
                Err(e) => {
                    error!(generated_name = %generated_name, error = %e, "Failed to record upload");
                    self.discard_blob(&generated_name).await;
                    return Err(e);
                }
            }
        }

        error!(
            original_name = %original_name,
            attempts = MAX_NAME_ATTEMPTS,
            "Could not find a free name for upload"
        );
        Err(DepotError::StorageExhausted {
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Remove a blob this upload wrote but could not record.
    async fn discard_blob(&self, generated_name: &str) {
        if let Err(e) = self.storage.delete(generated_name).await {
            // Left for the sweeper
            warn!(generated_name = %generated_name, error = %e, "Failed to discard unrecorded blob");
        }
    }

    /// Open a file for download and count it.
    ///
    /// The blob is opened before the counter is touched, so a dangling record
    /// is reported as not found and keeps its count.
    pub async fn download(&self, file_id: i64) -> Result<Download> {
        let record = self.get_file(file_id).await?;

        let (file, size) = match self.storage.open(&record.generated_name).await {
            Ok(opened) => opened,
            Err(DepotError::NotFound(_)) => {
                warn!(
                    file_id,
                    generated_name = %record.generated_name,
                    "Record has no blob on disk"
                );
                return Err(DepotError::NotFound("File".to_string()));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = FileRepository::new(self.db.pool())
            .increment_downloads(file_id)
            .await
        {
            warn!(file_id, error = %e, "Failed to count download");
        }

        debug!(file_id, size, "Serving download");
        Ok(Download { record, file, size })
    }

    /// Delete a file and its blob.
    pub async fn delete(&self, file_id: i64) -> Result<()> {
        let record = self.get_file(file_id).await?;

        match self.storage.delete(&record.generated_name).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    file_id,
                    generated_name = %record.generated_name,
                    "Blob already gone, removing record"
                );
            }
            Err(e) => {
                error!(
                    file_id,
                    generated_name = %record.generated_name,
                    error = %e,
                    "Failed to delete blob, keeping record"
                );
                return Err(e);
            }
        }

        if !FileRepository::new(self.db.pool()).delete(file_id).await? {
            return Err(DepotError::NotFound("File".to_string()));
        }

        info!(file_id, original_name = %record.original_name, "File deleted");
        Ok(())
    }

    /// List all files, newest first.
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        FileRepository::new(self.db.pool()).list().await
    }

    /// Get a file record by ID.
    ///
    /// A missing record yields [`DepotError::NotFound`].
    pub async fn get_file(&self, file_id: i64) -> Result<FileRecord> {
        FileRepository::new(self.db.pool())
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| DepotError::NotFound("File".to_string()))
    }
}
