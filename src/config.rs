use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://moodle_bridge.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5135";
const DEFAULT_RECOMMENDER_URL: &str = "http://localhost:5000";
const DEFAULT_SYNC_CONCURRENCY: usize = 10;
const DEFAULT_TAG_FETCH_CONCURRENCY: usize = 20;

#[derive(Clone, Debug)]
pub struct MoodleConfig {
    /// Full REST endpoint, e.g. `https://lms.example.org/webservice/rest/server.php`.
    pub base_url: String,
    pub token: String,
    pub tag_concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    pub base_url: String,
}

/// What course sync does with the stored difficulty of a course it already knows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DifficultyPolicy {
    /// Difficulty is only classified when the course is first inserted.
    #[default]
    PreserveOnUpdate,
    /// Every sync reclassifies difficulty from the current topic set.
    RecomputeOnUpdate,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub fetch_concurrency: usize,
    pub interval_secs: Option<u64>,
    pub difficulty_policy: DifficultyPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: DEFAULT_SYNC_CONCURRENCY,
            interval_secs: None,
            difficulty_policy: DifficultyPolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub moodle: MoodleConfig,
    pub recommender: RecommenderConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let moodle_url = env::var("MOODLE_URL")
            .map_err(|_| AppError::Config("MOODLE_URL is not set".to_string()))?;
        let moodle_token = env::var("MOODLE_TOKEN")
            .map_err(|_| AppError::Config("MOODLE_TOKEN is not set".to_string()))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let bind_addr: SocketAddr = match parse_var("BIND_ADDR")? {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|_| AppError::Config("invalid default bind address".to_string()))?,
        };
        let recommender_url =
            env::var("RECOMMENDER_URL").unwrap_or_else(|_| DEFAULT_RECOMMENDER_URL.to_string());

        let fetch_concurrency: usize =
            parse_var("SYNC_CONCURRENCY")?.unwrap_or(DEFAULT_SYNC_CONCURRENCY);
        let tag_concurrency: usize =
            parse_var("TAG_FETCH_CONCURRENCY")?.unwrap_or(DEFAULT_TAG_FETCH_CONCURRENCY);
        let interval_secs: Option<u64> = parse_var("SYNC_INTERVAL_SECS")?;
        let recompute: bool = parse_var("RECOMPUTE_DIFFICULTY")?.unwrap_or(false);

        Ok(Self {
            database_url,
            bind_addr,
            moodle: MoodleConfig {
                base_url: moodle_url,
                token: moodle_token,
                tag_concurrency: tag_concurrency.max(1),
            },
            recommender: RecommenderConfig {
                base_url: recommender_url.trim_end_matches('/').to_string(),
            },
            sync: SyncConfig {
                fetch_concurrency: fetch_concurrency.max(1),
                interval_secs: interval_secs.filter(|secs| *secs > 0),
                difficulty_policy: if recompute {
                    DifficultyPolicy::RecomputeOnUpdate
                } else {
                    DifficultyPolicy::PreserveOnUpdate
                },
            },
        })
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RECOMMENDER_URL.to_string(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(None),
    }
}
