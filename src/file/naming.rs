//! Generated blob names.
//!
//! Blob names are derived from the upload time, never from the client's
//! filename. Only a sanitized extension survives from the original name.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use super::MAX_EXTENSION_LENGTH;

/// Source of candidate blob names.
///
/// Implementations should make collisions unlikely, but callers must still
/// treat every generated name as a candidate that may already be taken.
pub trait NameGenerator: Send + Sync {
    /// Produce a candidate name with the given (already sanitized) extension.
    ///
    /// An empty extension yields a name without a dot.
    fn generate(&self, extension: &str) -> String;
}

/// Names made of the current UTC time in microseconds.
///
/// Successive calls on the same generator never return the same number,
/// even when the clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct TimestampNames {
    last: AtomicI64,
}

impl TimestampNames {
    /// Create a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_micros(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

impl NameGenerator for TimestampNames {
    fn generate(&self, extension: &str) -> String {
        let stamp = self.next_micros();
        if extension.is_empty() {
            stamp.to_string()
        } else {
            format!("{stamp}.{extension}")
        }
    }
}

/// Extract a safe extension from a client-supplied filename.
///
/// Any directory part is ignored, whichever separator it uses. The result
/// keeps only ASCII alphanumerics and is capped at [`MAX_EXTENSION_LENGTH`].
///
/// # Examples
///
/// ```
/// use depot::file::extract_extension;
///
/// assert_eq!(extract_extension("report.pdf"), "pdf");
/// assert_eq!(extract_extension("archive.tar.gz"), "gz");
/// assert_eq!(extract_extension("README"), "");
/// ```
pub fn extract_extension(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    Path::new(base)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(MAX_EXTENSION_LENGTH)
                .collect()
        })
        .unwrap_or_default()
}
