use std::time::Duration;

use tracing::{info, warn};

use crate::services::sync_service::{SyncService, SyncStats};
use crate::error::AppError;

/// Periodically runs a full Moodle sync.
pub struct SyncScheduler {
    service: SyncService,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(service: SyncService, interval_secs: u64) -> Self {
        Self {
            service,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs forever; a failed sync is logged and retried on the next tick.
    pub async fn start(self) {
        info!("Starting auto-sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_sync().await {
                Ok(stats) => {
                    info!(
                        "Auto-sync completed - Courses: {} added, {} updated | Students: {} new | Grades: {} processed",
                        stats.courses.added,
                        stats.courses.updated,
                        stats.grades.new_students,
                        stats.grades.grades_processed
                    );
                }
                Err(e) => {
                    warn!("Auto-sync failed: {:?}", e);
                }
            }
        }
    }

    async fn run_sync(&self) -> Result<SyncStats, AppError> {
        self.service.sync_all().await
    }
}
