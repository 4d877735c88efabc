#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use moodle_bridge::db::{self, repository};
use moodle_bridge::error::AppError;
use moodle_bridge::models::Course;
use moodle_bridge::moodle::{GradeItem, MoodleClient, MoodleCourse, MoodleUser};
use moodle_bridge::recommender::{Recommendation, RecommendationRequest, Recommender};

pub async fn setup_db() -> SqlitePool {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to create database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub async fn stored_course(db: &SqlitePool, external_id: &str) -> Option<Course> {
    repository::fetch_courses(db)
        .await
        .expect("Failed to fetch courses")
        .into_iter()
        .find(|c| c.external_id == external_id)
}

pub fn course(id: i64, title: &str, tags: &[&str]) -> MoodleCourse {
    MoodleCourse {
        id,
        fullname: title.to_string(),
        shortname: format!("C{}", id),
        summary: format!("<p>{} summary</p>", title),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn user(id: i64, username: &str) -> MoodleUser {
    MoodleUser {
        id,
        username: username.to_string(),
        full_name: format!("{} Example", username),
        email: format!("{}@example.org", username),
    }
}

pub fn course_total(raw: f64, max: f64) -> GradeItem {
    GradeItem {
        item_name: "Course total".to_string(),
        item_module: String::new(),
        item_type: "course".to_string(),
        raw_grade: Some(raw),
        max_grade: Some(max),
        course_tags: Vec::new(),
    }
}

pub fn quiz(name: &str, raw: f64) -> GradeItem {
    GradeItem {
        item_name: name.to_string(),
        item_module: "quiz".to_string(),
        item_type: "mod".to_string(),
        raw_grade: Some(raw),
        max_grade: Some(10.0),
        course_tags: Vec::new(),
    }
}

/// In-memory Moodle whose data can be changed between syncs.
#[derive(Default)]
pub struct FakeMoodle {
    courses: Mutex<Vec<MoodleCourse>>,
    tags: Mutex<HashMap<i64, Vec<String>>>,
    topics: Mutex<HashMap<i64, Vec<String>>>,
    enrolled: Mutex<HashMap<i64, Vec<MoodleUser>>>,
    grades: Mutex<HashMap<(i64, i64), Vec<GradeItem>>>,
    logins: Mutex<HashMap<String, i64>>,
    latency: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub grade_calls: AtomicUsize,
}

impl FakeMoodle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_courses(&self, courses: Vec<MoodleCourse>) {
        *self.courses.lock().unwrap() = courses;
    }

    pub fn set_tags(&self, course_id: i64, tags: &[&str]) {
        self.tags
            .lock()
            .unwrap()
            .insert(course_id, tags.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_topics(&self, course_id: i64, topics: &[&str]) {
        self.topics
            .lock()
            .unwrap()
            .insert(course_id, topics.iter().map(|t| t.to_string()).collect());
    }

    pub fn enroll(&self, course_id: i64, users: Vec<MoodleUser>) {
        self.enrolled.lock().unwrap().insert(course_id, users);
    }

    pub fn set_grades(&self, user_id: i64, course_id: i64, items: Vec<GradeItem>) {
        self.grades.lock().unwrap().insert((user_id, course_id), items);
    }

    pub fn set_login(&self, username: &str, user_id: i64) {
        self.logins
            .lock()
            .unwrap()
            .insert(username.to_string(), user_id);
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) {
        if let Some(latency) = self.latency {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl MoodleClient for FakeMoodle {
    async fn list_courses(&self) -> Vec<MoodleCourse> {
        self.courses.lock().unwrap().clone()
    }

    async fn get_course_tags(&self, course_id: i64) -> Vec<String> {
        self.tags
            .lock()
            .unwrap()
            .get(&course_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_topics_with_activities(&self, course_id: i64) -> Vec<String> {
        self.simulate_call().await;
        self.topics
            .lock()
            .unwrap()
            .get(&course_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_enrolled_users(&self, course_id: i64) -> Vec<MoodleUser> {
        self.simulate_call().await;
        self.enrolled
            .lock()
            .unwrap()
            .get(&course_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn get_user_grades(&self, user_id: i64, course_id: i64) -> Vec<GradeItem> {
        self.grade_calls.fetch_add(1, Ordering::SeqCst);
        self.grades
            .lock()
            .unwrap()
            .get(&(user_id, course_id))
            .cloned()
            .unwrap_or_default()
    }

    async fn resolve_user_id_by_login(&self, username: &str) -> Option<i64> {
        self.logins.lock().unwrap().get(username).copied()
    }
}

/// Records every request and answers with a fixed list.
#[derive(Default)]
pub struct FakeRecommender {
    pub requests: Mutex<Vec<RecommendationRequest>>,
    pub reloads: AtomicUsize,
    pub response: Vec<Recommendation>,
}

impl FakeRecommender {
    pub fn answering(response: Vec<Recommendation>) -> Self {
        Self {
            response,
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.response.clone())
    }

    async fn reload(&self) -> Result<(), AppError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
