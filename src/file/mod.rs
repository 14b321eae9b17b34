//! File management module for depot.
//!
//! This module keeps the blob directory and the metadata store consistent:
//! - Blob storage under generated names
//! - File metadata records with download counters
//! - Collision-resistant name generation with retry on conflict
//! - Upload, download and delete orchestration
//! - Periodic sweep of orphaned blobs

mod metadata;
mod naming;
mod service;
mod storage;
mod sweeper;

pub use metadata::{FileRecord, FileRepository, NewFileRecord};
pub use naming::{extract_extension, NameGenerator, TimestampNames};
pub use service::{Download, FileService, UploadRequest};
pub use storage::{BlobStore, StagedBlob, STAGING_DIR};
pub use sweeper::{SweepReport, Sweeper, DEFAULT_SWEEP_INTERVAL_SECS};

/// Number of generated names tried per upload before giving up.
pub const MAX_NAME_ATTEMPTS: usize = 5;

/// Maximum length for a generated name's extension (in characters).
pub const MAX_EXTENSION_LENGTH: usize = 16;

/// Default maximum upload size (1GB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;
