use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::moodle::MoodleClient;
use crate::recommender::Recommender;
use crate::services::{RecommendationService, SyncService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub moodle: Arc<dyn MoodleClient>,
    pub recommender: Arc<dyn Recommender>,
    pub sync: SyncConfig,
    /// Serializes sync passes from the scheduler and the admin routes.
    pub sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn sync_service(&self) -> SyncService {
        SyncService::new(self.db.clone(), self.moodle.clone(), self.sync.clone())
            .with_recommender(self.recommender.clone())
            .with_pass_lock(self.sync_lock.clone())
    }

    pub fn recommendation_service(&self) -> RecommendationService {
        RecommendationService::new(self.moodle.clone(), self.recommender.clone())
    }
}
