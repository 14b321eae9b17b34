//! Orphan blob sweeper for depot.
//!
//! A blob with no metadata record is an orphan: an upload that crashed
//! between writing its blob and inserting its record, or a blob copied into
//! the directory by hand. The sweeper removes them once at startup and then
//! periodically, along with staging files left by interrupted uploads.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::Result;

use super::metadata::FileRepository;
use super::storage::BlobStore;

/// Default sweep interval in seconds (one day).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Staging files untouched for this long belong to uploads that will never finish.
const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Blobs found on disk.
    pub scanned: usize,
    /// Blobs with no matching record.
    pub orphans: usize,
    /// Orphans deleted.
    pub removed: usize,
    /// Orphans that could not be deleted.
    pub failed: usize,
    /// Abandoned staging files removed.
    pub stale_staged: usize,
}

/// Background task removing blobs that have no metadata record.
///
/// The sweeper never touches records. Uploads still being received live in
/// the staging directory and are not blobs yet. An upload that has linked
/// its blob but not yet inserted its record can lose the blob to a sweep
/// running at that moment.
pub struct Sweeper {
    db: Arc<Database>,
    storage: Arc<BlobStore>,
    sweep_interval: Duration,
}

impl Sweeper {
    /// Create a new Sweeper with the default interval.
    pub fn new(db: Arc<Database>, storage: Arc<BlobStore>) -> Self {
        Self::with_interval(db, storage, DEFAULT_SWEEP_INTERVAL_SECS)
    }

    /// Create a new Sweeper with a custom interval.
    ///
    /// Intervals below one second are raised to one second.
    pub fn with_interval(db: Arc<Database>, storage: Arc<BlobStore>, interval_secs: u64) -> Self {
        Self {
            db,
            storage,
            sweep_interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run a single sweep.
    ///
    /// Fails without deleting anything if either side cannot be listed.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let blobs = self.storage.list().await?;
        let recorded = FileRepository::new(self.db.pool())
            .list_generated_names()
            .await?;

        let mut report = self.remove_orphans(blobs.difference(&recorded)).await;
        report.scanned = blobs.len();

        match self.storage.purge_staging(STALE_STAGING_AGE).await {
            Ok(removed) => report.stale_staged = removed,
            Err(e) => warn!(error = %e, "Failed to clean staging directory"),
        }

        Ok(report)
    }

    /// Delete the given orphans, carrying on past individual failures.
    async fn remove_orphans<'n>(
        &self,
        orphans: impl IntoIterator<Item = &'n String>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        for name in orphans {
            report.orphans += 1;
            match self.storage.delete(name).await {
                Ok(_) => {
                    info!(generated_name = %name, "Removed orphaned blob");
                    report.removed += 1;
                }
                Err(e) => {
                    error!(generated_name = %name, error = %e, "Failed to remove orphaned blob");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run the sweeper loop.
    ///
    /// The first sweep happens immediately, then one per interval.
    pub async fn run(&self) {
        info!(
            "Orphan sweeper started (interval: {} seconds)",
            self.sweep_interval.as_secs()
        );

        let mut timer = interval(self.sweep_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            match self.sweep_once().await {
                Ok(report) if report.orphans == 0 => {
                    debug!(scanned = report.scanned, "Sweep found no orphaned blobs");
                }
                Ok(report) => {
                    info!(
                        scanned = report.scanned,
                        orphans = report.orphans,
                        removed = report.removed,
                        failed = report.failed,
                        stale_staged = report.stale_staged,
                        "Sweep complete"
                    );
                }
                Err(e) => error!(error = %e, "Sweep failed"),
            }
        }
    }

    /// Start the sweeper loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
