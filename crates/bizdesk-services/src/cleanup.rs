use std::sync::Arc;
use std::time::Duration;

use bizdesk_core::AppError;
use bizdesk_db::FileStore;
use bizdesk_storage::Storage;
use chrono::Utc;
use tokio::time::interval;

use crate::files::release_unreferenced_file;

const ORPHAN_BATCH: i64 = 100;

/// Deletes uploads that no document ever referenced once their grace period
/// is over.
#[derive(Clone)]
pub struct CleanupService {
    files: Arc<dyn FileStore>,
    storage: Arc<dyn Storage>,
    grace: chrono::Duration,
    every: Duration,
}

impl CleanupService {
    pub fn new(
        files: Arc<dyn FileStore>,
        storage: Arc<dyn Storage>,
        grace_hours: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            files,
            storage,
            grace: chrono::Duration::hours(grace_hours),
            every: Duration::from_secs(interval_secs),
        }
    }

    /// Start the periodic task. Returns the handle for shutdown, `None`
    /// when the interval is zero.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.every.is_zero() {
            tracing::info!("Orphan file cleanup disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = interval(self.every);

            loop {
                ticker.tick().await;
                tracing::debug!("Starting scheduled cleanup of orphaned files");

                match self.run_once().await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "Orphaned files cleaned up"),
                    Err(e) => tracing::error!(error = %e, "Cleanup task failed"),
                }
            }
        }))
    }

    /// One sweep; returns how many files were deleted.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "orphans"))]
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - self.grace;
        let mut deleted = 0;

        loop {
            let orphans = self.files.list_orphans(cutoff, ORPHAN_BATCH).await?;
            let batch_len = orphans.len();
            let mut failed = false;

            for file in orphans {
                tracing::info!(
                    file_id = %file.id,
                    tenant_id = %file.tenant_id,
                    created_at = %file.created_at,
                    "Deleting never-referenced file"
                );
                let released =
                    release_unreferenced_file(self.files.as_ref(), self.storage.as_ref(), &file)
                        .await;
                match released {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        failed = true;
                        tracing::error!(error = %e, file_id = %file.id, "Failed to delete orphaned file");
                    }
                }
            }

            // A failing row would come back in the next page forever.
            if failed || (batch_len as i64) < ORPHAN_BATCH {
                break;
            }
        }

        Ok(deleted)
    }
}
