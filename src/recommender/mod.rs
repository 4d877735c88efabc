use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RecommenderConfig;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "moodleGrades")]
    pub moodle_grades: Vec<RecommenderGrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecommenderGrade {
    pub item_name: String,
    pub module_type: String,
    pub raw_grade: f64,
    pub max_grade: f64,
    pub course_tags: Vec<String>,
}

/// One suggestion as the engine reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Passed through untouched; the engine may use numbers or strings.
    #[serde(default)]
    pub course_id: serde_json::Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecommenderResponse {
    List(Vec<Recommendation>),
    Wrapped { recommendations: Vec<Recommendation> },
}

impl From<RecommenderResponse> for Vec<Recommendation> {
    fn from(response: RecommenderResponse) -> Self {
        match response {
            RecommenderResponse::List(items) => items,
            RecommenderResponse::Wrapped { recommendations } => recommendations,
        }
    }
}

pub fn parse_recommendations(body: &str) -> Result<Vec<Recommendation>, AppError> {
    serde_json::from_str::<RecommenderResponse>(body)
        .map(Vec::from)
        .map_err(|e| AppError::Upstream(format!("Failed to parse recommender response: {}", e)))
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, AppError>;

    /// Asks the engine to reload its training data.
    async fn reload(&self) -> Result<(), AppError>;
}

pub struct HttpRecommender {
    client: Client,
    config: RecommenderConfig,
}

impl HttpRecommender {
    pub fn new(config: RecommenderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, AppError> {
        let url = format!("{}/recommend", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Recommender unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::Upstream(format!("Failed to read recommender response: {}", e))
        })?;
        if !status.is_success() {
            warn!("Recommender returned {}: {}", status, body);
            return Err(AppError::Upstream(format!(
                "Recommender error {}: {}",
                status, body
            )));
        }

        parse_recommendations(&body)
    }

    async fn reload(&self) -> Result<(), AppError> {
        let url = format!("{}/reload", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Recommender unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Recommender reload failed: {}",
                response.status()
            )));
        }

        info!("Recommender data reload requested");
        Ok(())
    }
}
