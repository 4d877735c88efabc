use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, CourseSyncReport, GradeSyncReport};
use crate::recommender::Recommendation;
use crate::state::AppState;

#[derive(Deserialize)]
struct CourseQuery {
    course_id: i64,
}

#[derive(Deserialize)]
struct AnalyzeQuery {
    username: String,
    course_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse<T> {
    pub message: String,
    #[serde(flatten)]
    pub report: T,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub student_id: i64,
    pub username: String,
    pub recommendations: Vec<Recommendation>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/courses", get(list_courses))
        .route("/api/admin/sync-all-courses", post(sync_all_courses))
        .route("/api/admin/sync-users-grades", post(sync_users_grades))
        .route("/api/recommendations/{username}", get(recommendations_by_login))
        .route("/api/student/analyze", get(analyze_student))
        .route(
            "/api/students/{user_id}/recommendations",
            get(recommendations_by_user_id),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn sync_all_courses(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse<CourseSyncReport>>, AppError> {
    let report = state.sync_service().sync_courses().await?;
    Ok(Json(SyncResponse {
        message: report.summary(),
        report,
    }))
}

async fn sync_users_grades(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse<GradeSyncReport>>, AppError> {
    let report = state.sync_service().sync_users_and_grades().await?;
    Ok(Json(SyncResponse {
        message: report.summary(),
        report,
    }))
}

async fn recommendations_by_login(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let (_, recommendations) = state
        .recommendation_service()
        .recommend_for_login(&username, query.course_id)
        .await?;
    Ok(Json(recommendations))
}

async fn analyze_student(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let (student_id, recommendations) = state
        .recommendation_service()
        .recommend_for_login(&query.username, query.course_id)
        .await?;
    Ok(Json(AnalysisResponse {
        student_id,
        username: query.username,
        recommendations,
    }))
}

async fn recommendations_by_user_id(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let recommendations = state
        .recommendation_service()
        .recommend_for_user(user_id, query.course_id)
        .await?;
    Ok(Json(recommendations))
}
