//! depot - minimal file storage service
//!
//! Files are uploaded over HTTP, written to a blob directory under generated
//! names, and tracked in SQLite. A background sweeper removes blobs that no
//! record refers to.

pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{DepotError, Result};
pub use file::{BlobStore, FileRecord, FileService, Sweeper};
pub use web::WebServer;
