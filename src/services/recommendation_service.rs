use std::sync::Arc;

use tracing::info;

use crate::error::AppError;
use crate::models::merge_topics;
use crate::moodle::{GradeItem, MoodleClient};
use crate::recommender::{Recommendation, RecommendationRequest, Recommender, RecommenderGrade};

const MISSING_RAW_GRADE: f64 = 0.0;
const MISSING_MAX_GRADE: f64 = 100.0;

pub struct RecommendationService {
    moodle: Arc<dyn MoodleClient>,
    recommender: Arc<dyn Recommender>,
}

impl RecommendationService {
    pub fn new(moodle: Arc<dyn MoodleClient>, recommender: Arc<dyn Recommender>) -> Self {
        Self {
            moodle,
            recommender,
        }
    }

    pub async fn resolve_user(&self, username: &str) -> Result<i64, AppError> {
        self.moodle
            .resolve_user_id_by_login(username)
            .await
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found in Moodle", username)))
    }

    pub async fn recommend_for_login(
        &self,
        username: &str,
        course_id: i64,
    ) -> Result<(i64, Vec<Recommendation>), AppError> {
        let user_id = self.resolve_user(username).await?;
        let recommendations = self.recommend_for_user(user_id, course_id).await?;
        Ok((user_id, recommendations))
    }

    /// Relays the engine's suggestions for a user's grades in one course.
    pub async fn recommend_for_user(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<Vec<Recommendation>, AppError> {
        let grades = self.moodle.get_user_grades(user_id, course_id).await;
        if grades.is_empty() {
            return Err(AppError::NotFound(format!(
                "No grades for user {} in course {}",
                user_id, course_id
            )));
        }

        let course_tags = self.moodle.get_course_tags(course_id).await;
        let topic_tags = self.moodle.get_topics_with_activities(course_id).await;
        let context_tags = merge_topics(&course_tags, &topic_tags);

        let request = RecommendationRequest {
            user_id,
            moodle_grades: enrich_grades(grades, &context_tags),
        };

        info!(
            "Requesting recommendations for user {} ({} grade items)",
            user_id,
            request.moodle_grades.len()
        );
        self.recommender.recommend(&request).await
    }
}

/// Gives every grade item without tags of its own the course context tags.
pub fn enrich_grades(grades: Vec<GradeItem>, context_tags: &[String]) -> Vec<RecommenderGrade> {
    grades
        .into_iter()
        .map(|grade| RecommenderGrade {
            item_name: grade.item_name,
            module_type: grade.item_module,
            raw_grade: grade.raw_grade.unwrap_or(MISSING_RAW_GRADE),
            max_grade: grade.max_grade.unwrap_or(MISSING_MAX_GRADE),
            course_tags: if grade.course_tags.is_empty() {
                context_tags.to_vec()
            } else {
                grade.course_tags
            },
        })
        .collect()
}
