//! File metadata types and repository for depot.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::db::DbPool;
use crate::{DepotError, Result};

/// Metadata for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRecord {
    /// Unique file ID, never reused.
    pub id: i64,
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// Name of the blob in storage.
    pub generated_name: String,
    /// When the file was uploaded.
    pub upload_date: DateTime<Utc>,
    /// Number of successful downloads.
    pub downloads: i64,
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// Name of the blob in storage.
    pub generated_name: String,
    /// Upload timestamp.
    pub upload_date: DateTime<Utc>,
}

impl NewFileRecord {
    /// Create a new record stamped with the current time.
    pub fn new(original_name: impl Into<String>, generated_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            generated_name: generated_name.into(),
            upload_date: Utc::now(),
        }
    }

    /// Set the upload timestamp.
    pub fn with_upload_date(mut self, upload_date: DateTime<Utc>) -> Self {
        self.upload_date = upload_date;
        self
    }
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new file record.
    ///
    /// Fails with [`DepotError::Conflict`] if the generated name is taken.
    pub async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            "INSERT INTO files (original_name, generated_name, upload_date, downloads)
             VALUES ($1, $2, $3, 0)
             RETURNING id, original_name, generated_name, upload_date, downloads",
        )
        .bind(&new_file.original_name)
        .bind(&new_file.generated_name)
        .bind(new_file.upload_date)
        .fetch_one(self.pool)
        .await?;

        Ok(record)
    }

    /// Get a file record by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, original_name, generated_name, upload_date, downloads
             FROM files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// List all file records, newest upload first.
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, original_name, generated_name, upload_date, downloads
             FROM files ORDER BY upload_date DESC, id DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// List every generated name referenced by a record.
    pub async fn list_generated_names(&self) -> Result<BTreeSet<String>> {
        let names = sqlx::query_scalar::<_, String>("SELECT generated_name FROM files")
            .fetch_all(self.pool)
            .await?;

        Ok(names.into_iter().collect())
    }

    /// Atomically increment the download counter.
    ///
    /// Returns the new count.
    pub async fn increment_downloads(&self, id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "UPDATE files SET downloads = downloads + 1 WHERE id = $1 RETURNING downloads",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        count.ok_or_else(|| DepotError::NotFound(format!("file {id}")))
    }

    /// Delete a file record.
    ///
    /// # Returns
    ///
    /// `true` if the record was deleted, `false` if it didn't exist
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count stored file records.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
