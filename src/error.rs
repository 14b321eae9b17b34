//! Error types for depot.

use thiserror::Error;

/// Common error type for depot.
#[derive(Error, Debug)]
pub enum DepotError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant, except unique
    /// constraint violations which become [`DepotError::Conflict`].
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A generated name is already taken, on disk or in the metadata store.
    #[error("name conflict: {0}")]
    Conflict(String),

    /// Every naming attempt for an upload collided.
    #[error("storage exhausted after {attempts} naming attempts")]
    StorageExhausted {
        /// Number of names tried.
        attempts: usize,
    },

    /// Validation error for client input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Upload exceeds the configured size limit.
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge {
        /// Limit in bytes.
        limit: u64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DepotError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DepotError::Conflict(db_err.message().to_string());
            }
        }
        DepotError::Database(e.to_string())
    }
}

/// Result type alias for depot operations.
pub type Result<T> = std::result::Result<T, DepotError>;
