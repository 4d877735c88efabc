use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{DifficultyPolicy, SyncConfig};
use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    Course, CourseSyncReport, Difficulty, GradeSyncReport, MOODLE_PLATFORM, NewStudent,
    merge_topics,
};
use crate::moodle::{GradeItem, MoodleClient, MoodleCourse, MoodleUser};
use crate::recommender::Recommender;
use crate::task_pool::TaskPool;

pub const COURSES_REQUIRED: &str = "No courses found. Sync courses first.";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>").expect("valid html tag pattern"));

pub struct SyncService {
    db: SqlitePool,
    moodle: Arc<dyn MoodleClient>,
    recommender: Option<Arc<dyn Recommender>>,
    config: SyncConfig,
    // held for a whole reconciliation pass; services sharing it never overlap
    pass_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
pub struct SyncStats {
    pub courses: CourseSyncReport,
    pub grades: GradeSyncReport,
}

/// Final grade of one user in one persisted course.
#[derive(Debug, Clone)]
struct GradeObservation {
    moodle_user_id: i64,
    course_id: String,
    grade: Option<f64>,
    max_grade: Option<f64>,
}

#[derive(Debug, Default)]
struct CourseFetch {
    users: Vec<MoodleUser>,
    grades: Vec<GradeObservation>,
}

impl SyncService {
    pub fn new(db: SqlitePool, moodle: Arc<dyn MoodleClient>, config: SyncConfig) -> Self {
        Self {
            db,
            moodle,
            recommender: None,
            config,
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Shares a pass lock with other services writing to the same database.
    pub fn with_pass_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.pass_lock = lock;
        self
    }

    /// Recommender to notify after grade records change.
    pub fn with_recommender(mut self, recommender: Arc<dyn Recommender>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    pub async fn sync_all(&self) -> Result<SyncStats, AppError> {
        info!("Starting full sync...");

        info!("Step 1: Syncing courses from Moodle");
        let courses = self.sync_courses().await?;

        info!("Step 2: Syncing students and grades from Moodle");
        let grades = self.sync_users_and_grades().await?;

        let stats = SyncStats { courses, grades };
        info!("Sync completed successfully: {:?}", stats);
        Ok(stats)
    }

    pub async fn sync_courses(&self) -> Result<CourseSyncReport, AppError> {
        let _pass = self.pass_lock.lock().await;

        let remote_courses = self.moodle.list_courses().await;
        if remote_courses.is_empty() {
            info!("Moodle returned no courses, nothing to sync");
            return Ok(CourseSyncReport::default());
        }

        let pool = TaskPool::new(self.config.fetch_concurrency);
        let moodle = Arc::clone(&self.moodle);
        let enriched: Vec<(MoodleCourse, Vec<String>)> = pool
            .run_all(remote_courses, |course| {
                let moodle = Arc::clone(&moodle);
                async move {
                    let topics = moodle.get_topics_with_activities(course.id).await;
                    (course, topics)
                }
            })
            .await;

        let mut existing: HashMap<String, Course> = repository::fetch_courses(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.external_id.clone(), c))
            .collect();

        let mut report = CourseSyncReport::default();
        let mut tx = self.db.begin().await?;

        for (remote, content_topics) in enriched {
            let topics = merge_topics(&remote.tags, &content_topics);
            let difficulty = Difficulty::classify(&topics);
            let external_id = remote.id.to_string();
            let description = strip_html(&remote.summary);

            if let Some(course) = existing.get_mut(&external_id) {
                course.title = remote.fullname;
                course.description = description;
                course.topics = topics;
                if self.config.difficulty_policy == DifficultyPolicy::RecomputeOnUpdate {
                    course.difficulty = difficulty;
                }
                repository::update_course(&mut *tx, course).await?;
                report.updated += 1;
            } else {
                let course = Course {
                    id: Uuid::new_v4().to_string(),
                    external_id: external_id.clone(),
                    title: remote.fullname,
                    description,
                    platform: MOODLE_PLATFORM.to_string(),
                    difficulty,
                    topics,
                };
                repository::insert_course(&mut *tx, &course).await?;
                debug!("New course {} ({})", course.title, external_id);
                existing.insert(external_id, course);
                report.added += 1;
            }
        }

        tx.commit().await?;

        info!(
            "Course sync committed: {} added, {} updated",
            report.added, report.updated
        );
        Ok(report)
    }

    pub async fn sync_users_and_grades(&self) -> Result<GradeSyncReport, AppError> {
        let _pass = self.pass_lock.lock().await;

        let courses = repository::fetch_courses(&self.db).await?;
        if courses.is_empty() {
            return Err(AppError::Precondition(COURSES_REQUIRED.to_string()));
        }

        let mut students: HashMap<i64, i64> = repository::fetch_students(&self.db)
            .await?
            .into_iter()
            .map(|s| (s.moodle_user_id, s.id))
            .collect();

        let mut enrollments: HashMap<(i64, String), i64> = repository::fetch_enrollments(&self.db)
            .await?
            .into_iter()
            .map(|e| ((e.moodle_user_id, e.course_id), e.id))
            .collect();

        let targets: Vec<(String, i64)> = courses
            .into_iter()
            .filter_map(|c| match c.external_id.parse::<i64>() {
                Ok(remote_id) => Some((c.id, remote_id)),
                Err(_) => {
                    warn!("Skipping course {} with non-numeric external id", c.id);
                    None
                }
            })
            .collect();

        let pool = TaskPool::new(self.config.fetch_concurrency);
        let moodle = Arc::clone(&self.moodle);
        let batches: Vec<CourseFetch> = pool
            .run_all(targets, |(course_id, remote_course_id)| {
                let moodle = Arc::clone(&moodle);
                async move { fetch_course_grades(moodle, course_id, remote_course_id).await }
            })
            .await;

        let mut report = GradeSyncReport::default();

        let mut tx = self.db.begin().await?;
        // first occurrence of a remote id wins
        for user in batches.iter().flat_map(|batch| &batch.users) {
            if students.contains_key(&user.id) {
                continue;
            }
            let student = repository::insert_student(
                &mut *tx,
                &NewStudent {
                    moodle_user_id: user.id,
                    username: user.username.clone(),
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                },
            )
            .await?;
            students.insert(user.id, student.id);
            report.new_students += 1;
        }
        tx.commit().await?;
        debug!("Committed {} new students", report.new_students);

        let synced_at = Utc::now().to_rfc3339();
        let mut tx = self.db.begin().await?;
        for observation in batches.into_iter().flat_map(|batch| batch.grades) {
            let Some(&student_id) = students.get(&observation.moodle_user_id) else {
                continue;
            };

            let key = (observation.moodle_user_id, observation.course_id);
            match enrollments.get(&key).copied() {
                Some(id) => {
                    repository::update_enrollment(
                        &mut *tx,
                        id,
                        observation.grade,
                        observation.max_grade,
                        &synced_at,
                    )
                    .await?;
                }
                None => {
                    let id = repository::insert_enrollment(
                        &mut *tx,
                        student_id,
                        &key.1,
                        observation.grade,
                        observation.max_grade,
                        &synced_at,
                    )
                    .await?;
                    enrollments.insert(key, id);
                }
            }
            report.grades_processed += 1;
        }
        tx.commit().await?;

        info!(
            "Grade sync committed: {} new students, {} grades processed",
            report.new_students, report.grades_processed
        );

        if report.grades_processed > 0 {
            if let Some(recommender) = &self.recommender {
                if let Err(e) = recommender.reload().await {
                    warn!("Failed to notify recommender about new grades: {}", e);
                }
            }
        }

        Ok(report)
    }
}

async fn fetch_course_grades(
    moodle: Arc<dyn MoodleClient>,
    course_id: String,
    remote_course_id: i64,
) -> CourseFetch {
    let users = moodle.get_enrolled_users(remote_course_id).await;
    let mut grades = Vec::new();

    for user in &users {
        let items = moodle.get_user_grades(user.id, remote_course_id).await;
        if let Some(total) = items.into_iter().find(GradeItem::is_course_total) {
            grades.push(GradeObservation {
                moodle_user_id: user.id,
                course_id: course_id.clone(),
                grade: total.raw_grade,
                max_grade: total.max_grade,
            });
        }
    }

    CourseFetch { users, grades }
}

pub fn strip_html(input: &str) -> String {
    HTML_TAG.replace_all(input, "").into_owned()
}
