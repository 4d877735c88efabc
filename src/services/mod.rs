pub mod recommendation_service;
pub mod scheduler;
pub mod sync_service;

pub use recommendation_service::RecommendationService;
pub use scheduler::SyncScheduler;
pub use sync_service::{SyncService, SyncStats};
