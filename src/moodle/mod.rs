pub mod cache;
pub mod dto;
pub mod envelope;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MoodleConfig;
use crate::error::AppError;
use crate::task_pool::TaskPool;

pub use cache::TagCache;
pub use envelope::Envelope;

/// Grade item type Moodle uses for the course total.
pub const COURSE_ITEM_TYPE: &str = "course";

const GRADED_MODULES: [&str; 2] = ["quiz", "assign"];
const DEFAULT_COURSE_TITLE: &str = "Unnamed Course";
const DEFAULT_ITEM_NAME: &str = "Course total";

#[derive(Debug, Error)]
pub enum MoodleError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("moodle exception {exception}: {message}")]
    Api { exception: String, message: String },

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodleCourse {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    /// HTML as returned by Moodle.
    pub summary: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodleUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeItem {
    pub item_name: String,
    pub item_module: String,
    pub item_type: String,
    pub raw_grade: Option<f64>,
    pub max_grade: Option<f64>,
    /// Tags specific to this item. Moodle never fills these; the
    /// recommendation builder falls back to the course context when empty.
    #[serde(default)]
    pub course_tags: Vec<String>,
}

impl GradeItem {
    pub fn is_course_total(&self) -> bool {
        self.item_type == COURSE_ITEM_TYPE
    }
}

/// Read access to the Moodle web services.
///
/// Every call degrades to an empty result on failure; callers never see a
/// transport or API error.
#[async_trait]
pub trait MoodleClient: Send + Sync {
    async fn list_courses(&self) -> Vec<MoodleCourse>;
    async fn get_course_tags(&self, course_id: i64) -> Vec<String>;
    async fn get_topics_with_activities(&self, course_id: i64) -> Vec<String>;
    async fn get_enrolled_users(&self, course_id: i64) -> Vec<MoodleUser>;
    async fn get_user_grades(&self, user_id: i64, course_id: i64) -> Vec<GradeItem>;
    async fn resolve_user_id_by_login(&self, username: &str) -> Option<i64>;
}

#[derive(Clone)]
pub struct MoodleHttpClient {
    client: Client,
    config: Arc<MoodleConfig>,
    tags: Arc<TagCache>,
}

impl MoodleHttpClient {
    pub fn new(config: MoodleConfig, tags: Arc<TagCache>) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            config: Arc::new(config),
            tags,
        })
    }

    async fn call(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<Envelope, MoodleError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("wstoken", self.config.token.as_str()),
            ("wsfunction", function),
            ("moodlewsrestformat", "json"),
        ];
        query.extend(params.iter().map(|(key, value)| (*key, value.as_str())));

        let url = Url::parse_with_params(&self.config.base_url, &query)
            .map_err(|e| MoodleError::InvalidUrl(e.to_string()))?;

        debug!("Calling Moodle function {}", function);

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Envelope::parse(&body)
    }

    async fn fetch_courses(&self) -> Result<Vec<MoodleCourse>, MoodleError> {
        let raw: Vec<dto::CourseRaw> = self
            .call("core_course_get_courses", &[])
            .await?
            .into_items("courses")?;

        // id 1 is the site front page, not a real course
        Ok(raw
            .into_iter()
            .filter(|c| c.id > 1)
            .map(|c| MoodleCourse {
                id: c.id,
                fullname: c.fullname.unwrap_or_else(|| DEFAULT_COURSE_TITLE.to_string()),
                shortname: c.shortname.unwrap_or_default(),
                summary: c.summary.unwrap_or_default(),
                tags: Vec::new(),
            })
            .collect())
    }

    /// `None` when Moodle answered without a tag list at all.
    async fn fetch_course_tags(&self, course_id: i64) -> Result<Option<Vec<String>>, MoodleError> {
        let tags: Option<Vec<dto::ItemTag>> = self
            .call(
                "core_tag_get_item_tags",
                &[
                    ("component", "core".to_string()),
                    ("itemtype", "course".to_string()),
                    ("itemid", course_id.to_string()),
                ],
            )
            .await?
            .into_optional_items("tags")?;

        Ok(tags.map(|tags| tags.iter().map(dto::ItemTag::name).collect()))
    }

    async fn fetch_topics(&self, course_id: i64) -> Result<Vec<String>, MoodleError> {
        let sections: Vec<dto::Section> = self
            .call(
                "core_course_get_contents",
                &[("courseid", course_id.to_string())],
            )
            .await?
            .into_items("sections")?;

        Ok(sections
            .into_iter()
            .filter(|section| {
                section
                    .modules
                    .iter()
                    .any(|module| GRADED_MODULES.contains(&module.modname.as_str()))
            })
            .map(|section| section.name)
            .filter(|name| !name.trim().is_empty())
            .collect())
    }

    async fn fetch_enrolled_users(&self, course_id: i64) -> Result<Vec<MoodleUser>, MoodleError> {
        let users: Vec<dto::UserRaw> = self
            .call(
                "core_enrol_get_enrolled_users",
                &[("courseid", course_id.to_string())],
            )
            .await?
            .into_items("users")?;

        Ok(users.into_iter().map(MoodleUser::from).collect())
    }

    async fn fetch_user_grades(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Vec<GradeItem>, MoodleError> {
        let reports: Vec<dto::UserGradeRaw> = self
            .call(
                "gradereport_user_get_grade_items",
                &[
                    ("userid", user_id.to_string()),
                    ("courseid", course_id.to_string()),
                ],
            )
            .await?
            .into_items("usergrades")?;

        // Moodle returns at most one report for a single user id
        let Some(report) = reports.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(report
            .gradeitems
            .into_iter()
            .map(|item| GradeItem {
                item_name: item
                    .itemname
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string()),
                item_module: item.itemmodule.unwrap_or_default(),
                item_type: item.itemtype.unwrap_or_default(),
                raw_grade: item.graderaw,
                max_grade: item.grademax,
                course_tags: Vec::new(),
            })
            .collect())
    }

    async fn fetch_user_id(&self, username: &str) -> Result<Option<i64>, MoodleError> {
        let users: Vec<dto::UserRaw> = self
            .call(
                "core_user_get_users",
                &[
                    ("criteria[0][key]", "username".to_string()),
                    ("criteria[0][value]", username.to_string()),
                ],
            )
            .await?
            .into_items("users")?;

        Ok(users.first().map(|u| u.id))
    }
}

impl From<dto::UserRaw> for MoodleUser {
    fn from(raw: dto::UserRaw) -> Self {
        Self {
            id: raw.id,
            username: raw.username,
            full_name: raw.fullname,
            email: raw.email,
        }
    }
}

#[async_trait]
impl MoodleClient for MoodleHttpClient {
    async fn list_courses(&self) -> Vec<MoodleCourse> {
        let mut courses = match self.fetch_courses().await {
            Ok(courses) => courses,
            Err(e) => {
                warn!("Failed to list Moodle courses: {}", e);
                return Vec::new();
            }
        };

        let untagged: Vec<i64> = courses
            .iter()
            .filter(|c| c.tags.is_empty())
            .map(|c| c.id)
            .collect();

        let pool = TaskPool::new(self.config.tag_concurrency);
        let fetched: HashMap<i64, Vec<String>> = pool
            .run_all(untagged, |course_id| {
                let client = self.clone();
                async move { (course_id, client.get_course_tags(course_id).await) }
            })
            .await
            .into_iter()
            .collect();

        for course in &mut courses {
            if let Some(tags) = fetched.get(&course.id) {
                course.tags = tags.clone();
            }
        }

        courses
    }

    async fn get_course_tags(&self, course_id: i64) -> Vec<String> {
        if let Some(cached) = self.tags.get(course_id) {
            return cached;
        }

        match self.fetch_course_tags(course_id).await {
            Ok(Some(tags)) => {
                self.tags.insert(course_id, tags.clone());
                tags
            }
            Ok(None) => {
                debug!("Course {} answered without a tag list", course_id);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to fetch tags for course {}: {}", course_id, e);
                Vec::new()
            }
        }
    }

    async fn get_topics_with_activities(&self, course_id: i64) -> Vec<String> {
        self.fetch_topics(course_id).await.unwrap_or_else(|e| {
            warn!("Failed to fetch contents for course {}: {}", course_id, e);
            Vec::new()
        })
    }

    async fn get_enrolled_users(&self, course_id: i64) -> Vec<MoodleUser> {
        self.fetch_enrolled_users(course_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to fetch enrolled users for course {}: {}", course_id, e);
                Vec::new()
            })
    }

    async fn get_user_grades(&self, user_id: i64, course_id: i64) -> Vec<GradeItem> {
        self.fetch_user_grades(user_id, course_id)
            .await
            .unwrap_or_else(|e| {
                warn!(
                    "Failed to fetch grades for user {} in course {}: {}",
                    user_id, course_id, e
                );
                Vec::new()
            })
    }

    async fn resolve_user_id_by_login(&self, username: &str) -> Option<i64> {
        match self.fetch_user_id(username).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to resolve Moodle user {}: {}", username, e);
                None
            }
        }
    }
}

/// Client that knows no courses and no users.
pub struct NoopMoodleClient;

#[async_trait]
impl MoodleClient for NoopMoodleClient {
    async fn list_courses(&self) -> Vec<MoodleCourse> {
        Vec::new()
    }

    async fn get_course_tags(&self, _course_id: i64) -> Vec<String> {
        Vec::new()
    }

    async fn get_topics_with_activities(&self, _course_id: i64) -> Vec<String> {
        Vec::new()
    }

    async fn get_enrolled_users(&self, _course_id: i64) -> Vec<MoodleUser> {
        Vec::new()
    }

    async fn get_user_grades(&self, _user_id: i64, _course_id: i64) -> Vec<GradeItem> {
        Vec::new()
    }

    async fn resolve_user_id_by_login(&self, _username: &str) -> Option<i64> {
        None
    }
}
