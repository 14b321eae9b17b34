//! API handlers and shared state.

pub mod file;

pub use file::*;

use std::sync::Arc;

use crate::db::Database;
use crate::file::{BlobStore, FileService, NameGenerator, TimestampNames, DEFAULT_MAX_UPLOAD_SIZE};

/// Shared database handle.
pub type SharedDatabase = Arc<Database>;

/// Application state shared across handlers.
pub struct AppState {
    /// Metadata store.
    pub db: SharedDatabase,
    /// Blob store.
    pub storage: Arc<BlobStore>,
    /// Blob name source.
    pub names: Arc<dyn NameGenerator>,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new application state with timestamp names.
    pub fn new(db: SharedDatabase, storage: Arc<BlobStore>) -> Self {
        Self {
            db,
            storage,
            names: Arc::new(TimestampNames::new()),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Replace the name generator.
    pub fn with_names(mut self, names: Arc<dyn NameGenerator>) -> Self {
        self.names = names;
        self
    }

    /// Set the maximum upload size in bytes.
    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    /// File service borrowing this state.
    pub fn file_service(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.storage, self.names.as_ref())
            .with_max_upload_size(self.max_upload_size)
    }
}
