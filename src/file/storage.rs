//! Blob storage for depot.
//!
//! Blobs live in a single flat directory, one file per generated name:
//! ```text
//! {base_path}/
//! ├── 1718035200123456.pdf
//! ├── 1718035200123457.png
//! └── 1718035200123458
//! ```

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{DepotError, Result};

/// Subdirectory of the blob directory holding uploads still being received.
pub const STAGING_DIR: &str = ".staging";

/// Attempts at finding a free staging file name.
const MAX_STAGE_ATTEMPTS: usize = 16;

static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// An upload being received into the staging directory.
///
/// Bytes are appended as they arrive and the size limit is enforced on every
/// chunk. [`BlobStore::commit`] links the finished file under its final name.
/// Dropping a `StagedBlob` removes the staging file; committed blobs keep
/// their data through the link.
#[derive(Debug)]
pub struct StagedBlob {
    file: Option<File>,
    path: PathBuf,
    size: u64,
    limit: u64,
}

impl StagedBlob {
    /// Append a chunk of data.
    ///
    /// Fails with [`DepotError::TooLarge`] once the total would pass the limit.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let size = self.size.saturating_add(chunk.len() as u64);
        if size > self.limit {
            return Err(DepotError::TooLarge { limit: self.limit });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged blob already finished"))?;
        file.write_all(chunk).await?;
        self.size = size;
        Ok(())
    }

    /// Bytes received so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush and sync the data to disk. Further appends fail.
    async fn finish(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to remove staging file"),
        }
    }
}

/// Blob store backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct BlobStore {
    /// Directory holding the blobs.
    base_path: PathBuf,
}

impl BlobStore {
    /// Create a new BlobStore with the given base path.
    ///
    /// The base and staging directories are created if they don't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join(STAGING_DIR))?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full path for a blob name.
    pub fn blob_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn staging_path(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    /// Start receiving a new upload of at most `limit` bytes.
    pub async fn stage(&self, limit: u64) -> Result<StagedBlob> {
        let staging = self.staging_path();
        fs::create_dir_all(&staging).await?;

        for _ in 0..MAX_STAGE_ATTEMPTS {
            let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
            let path = staging.join(format!("{}-{}", std::process::id(), seq));

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(StagedBlob {
                        file: Some(file),
                        path,
                        size: 0,
                        limit,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DepotError::Conflict("no free staging file name".to_string()))
    }

    /// Publish a staged upload under `name`.
    ///
    /// The data is synced to disk before the name appears. Fails with
    /// [`DepotError::Conflict`] if a blob with that name exists; an existing
    /// blob is never overwritten. The same staged blob can be committed again
    /// under another name after a conflict.
    pub async fn commit(&self, staged: &mut StagedBlob, name: &str) -> Result<()> {
        Self::check_name(name)?;
        staged.finish().await?;

        let path = self.blob_path(name);
        match fs::hard_link(&staged.path, &path).await {
            Ok(()) => {
                debug!(path = ?path, size = staged.size, "Committed blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(DepotError::Conflict(format!("blob {name} already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a new blob from memory.
    ///
    /// Same guarantees as [`BlobStore::commit`].
    pub async fn write(&self, name: &str, content: &[u8]) -> Result<()> {
        Self::check_name(name)?;
        let mut staged = self.stage(u64::MAX).await?;
        staged.append(content).await?;
        self.commit(&mut staged, name).await
    }

    /// Read a whole blob into memory.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Self::check_name(name)?;

        match fs::read(self.blob_path(name)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DepotError::NotFound(format!("blob {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a blob for streaming.
    ///
    /// Returns the open file and its size in bytes.
    pub async fn open(&self, name: &str) -> Result<(File, u64)> {
        Self::check_name(name)?;

        let file = match File::open(self.blob_path(name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DepotError::NotFound(format!("blob {name}")));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(DepotError::NotFound(format!("blob {name}")));
        }

        Ok((file, metadata.len()))
    }

    /// Delete a blob.
    ///
    /// # Returns
    ///
    /// `true` if the blob was deleted, `false` if it didn't exist
    pub async fn delete(&self, name: &str) -> Result<bool> {
        Self::check_name(name)?;

        match fs::remove_file(self.blob_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a blob exists.
    pub async fn exists(&self, name: &str) -> bool {
        if Self::check_name(name).is_err() {
            return false;
        }
        fs::try_exists(self.blob_path(name)).await.unwrap_or(false)
    }

    /// List the names of all blobs.
    ///
    /// Only regular files with valid blob names are returned. Files whose
    /// names this store would refuse to touch are skipped with a warning.
    pub async fn list(&self) -> Result<BTreeSet<String>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut names = BTreeSet::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                debug!(path = ?entry.path(), "Skipping non-file entry in blob directory");
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) if Self::check_name(&name).is_ok() => {
                    names.insert(name);
                }
                Ok(name) => warn!(name = ?name, "Skipping file with unusable blob name"),
                Err(raw) => debug!(name = ?raw, "Skipping blob with non UTF-8 name"),
            }
        }

        Ok(names)
    }

    /// Remove staging files last modified more than `older_than` ago.
    ///
    /// These are uploads interrupted by a crash. Returns how many were removed.
    pub async fn purge_staging(&self, older_than: Duration) -> Result<usize> {
        let mut entries = fs::read_dir(self.staging_path()).await?;
        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < older_than {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(path = ?entry.path(), "Removed stale staging file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?entry.path(), error = %e, "Failed to remove staging file"),
            }
        }

        Ok(removed)
    }

    /// Reject names that would escape the blob directory.
    fn check_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(DepotError::Validation(format!("invalid blob name: {name:?}")));
        }
        Ok(())
    }
}
