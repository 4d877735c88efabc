use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moodle_bridge::api::router;
use moodle_bridge::config::AppConfig;
use moodle_bridge::db;
use moodle_bridge::moodle::{MoodleHttpClient, TagCache};
use moodle_bridge::recommender::HttpRecommender;
use moodle_bridge::services::SyncScheduler;
use moodle_bridge::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "moodle_bridge=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let tags = Arc::new(TagCache::new());
    let moodle = Arc::new(MoodleHttpClient::new(config.moodle.clone(), tags)?);
    let recommender = Arc::new(HttpRecommender::new(config.recommender.clone())?);

    let state = AppState {
        db: pool.clone(),
        moodle,
        recommender,
        sync: config.sync.clone(),
        sync_lock: Arc::new(Mutex::new(())),
    };

    if let Some(interval_secs) = config.sync.interval_secs {
        let scheduler = SyncScheduler::new(state.sync_service(), interval_secs);
        tokio::spawn(scheduler.start());
    }

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
