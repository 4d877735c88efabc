mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use moodle_bridge::config::{DifficultyPolicy, SyncConfig};
use moodle_bridge::db::repository;
use moodle_bridge::error::AppError;
use moodle_bridge::models::Difficulty;
use moodle_bridge::services::SyncService;
use moodle_bridge::services::sync_service::COURSES_REQUIRED;
use tokio::sync::Mutex;

use common::{FakeMoodle, FakeRecommender, course, course_total, quiz, setup_db, stored_course, user};

fn service(db: sqlx::SqlitePool, moodle: Arc<FakeMoodle>) -> SyncService {
    SyncService::new(db, moodle, SyncConfig::default())
}

#[tokio::test]
async fn test_new_course_is_inserted_with_merged_topics() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(42, "Intro to Testing", &["qa"])]);
    moodle.set_topics(42, &["Module 1"]);

    let report = service(db.clone(), moodle)
        .sync_courses()
        .await
        .expect("course sync failed");

    assert_eq!(report.added, 1);
    assert_eq!(report.updated, 0);

    let stored = stored_course(&db, "42")
        .await
        .expect("course not stored");
    let mut topics = stored.topics.clone();
    topics.sort();
    assert_eq!(topics, vec!["Module 1".to_string(), "qa".to_string()]);
    assert_eq!(stored.difficulty, Difficulty::Beginner);
    assert_eq!(stored.title, "Intro to Testing");
    assert_eq!(stored.description, "Intro to Testing summary");
    assert_eq!(stored.platform, "Moodle");
}

#[tokio::test]
async fn test_advanced_tag_elevates_difficulty() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(7, "Algorithms", &["Advanced Algorithms"])]);

    service(db.clone(), moodle)
        .sync_courses()
        .await
        .expect("course sync failed");

    let stored = stored_course(&db, "7")
        .await
        .expect("course not stored");
    assert_eq!(stored.difficulty, Difficulty::Advanced);
}

#[tokio::test]
async fn test_second_course_sync_updates_in_place() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![
        course(42, "Intro to Testing", &["qa"]),
        course(43, "Databases", &["sql"]),
    ]);
    moodle.set_topics(42, &["Module 1"]);

    let sync = service(db.clone(), moodle);
    let first = sync.sync_courses().await.expect("first sync failed");
    let before = repository::fetch_courses(&db).await.expect("fetch failed");

    let second = sync.sync_courses().await.expect("second sync failed");
    let after = repository::fetch_courses(&db).await.expect("fetch failed");

    assert_eq!(first.added, 2);
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(after.len(), 2);

    for course in &before {
        let same = after
            .iter()
            .find(|c| c.external_id == course.external_id)
            .expect("course disappeared");
        assert_eq!(same.id, course.id);
        assert_eq!(same.topics, course.topics);
    }
}

#[tokio::test]
async fn test_update_overwrites_title_and_topics() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(42, "Intro to Testing", &["qa"])]);

    let sync = service(db.clone(), moodle.clone());
    sync.sync_courses().await.expect("first sync failed");

    moodle.set_courses(vec![course(42, "Testing Fundamentals", &["qa", "tdd"])]);
    moodle.set_topics(42, &["Week 2"]);
    sync.sync_courses().await.expect("second sync failed");

    let stored = stored_course(&db, "42")
        .await
        .expect("course not stored");
    assert_eq!(stored.title, "Testing Fundamentals");
    assert_eq!(
        stored.topics,
        vec!["qa".to_string(), "tdd".to_string(), "Week 2".to_string()]
    );
}

#[tokio::test]
async fn test_difficulty_preserved_on_update_by_default() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(9, "Compilers", &["intro"])]);

    let sync = service(db.clone(), moodle.clone());
    sync.sync_courses().await.expect("first sync failed");

    moodle.set_courses(vec![course(9, "Compilers", &["hard mode"])]);
    sync.sync_courses().await.expect("second sync failed");

    let stored = stored_course(&db, "9")
        .await
        .expect("course not stored");
    assert_eq!(stored.difficulty, Difficulty::Beginner);
    assert_eq!(stored.topics, vec!["hard mode".to_string()]);
}

#[tokio::test]
async fn test_difficulty_recomputed_when_configured() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(9, "Compilers", &["intro"])]);

    let config = SyncConfig {
        difficulty_policy: DifficultyPolicy::RecomputeOnUpdate,
        ..SyncConfig::default()
    };
    let sync = SyncService::new(db.clone(), moodle.clone(), config);
    sync.sync_courses().await.expect("first sync failed");

    moodle.set_courses(vec![course(9, "Compilers", &["hard mode"])]);
    sync.sync_courses().await.expect("second sync failed");

    let stored = stored_course(&db, "9")
        .await
        .expect("course not stored");
    assert_eq!(stored.difficulty, Difficulty::Advanced);
}

#[tokio::test]
async fn test_empty_moodle_course_list_changes_nothing() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());

    let report = service(db.clone(), moodle)
        .sync_courses()
        .await
        .expect("course sync failed");

    assert_eq!(report.added, 0);
    assert_eq!(report.updated, 0);
    assert!(repository::fetch_courses(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_grade_sync_without_courses_is_precondition_failure() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());

    let result = service(db, moodle).sync_users_and_grades().await;

    match result {
        Err(AppError::Precondition(message)) => assert_eq!(message, COURSES_REQUIRED),
        other => panic!("expected precondition failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_student_in_two_courses_is_created_once() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(2, "Rust", &[]), course(3, "SQL", &[])]);
    moodle.enroll(2, vec![user(100, "alice"), user(101, "bob")]);
    moodle.enroll(3, vec![user(100, "alice")]);
    moodle.set_grades(100, 2, vec![quiz("Quiz 1", 8.0), course_total(80.0, 100.0)]);
    moodle.set_grades(100, 3, vec![course_total(55.0, 100.0)]);
    moodle.set_grades(101, 2, vec![course_total(91.0, 100.0)]);

    let sync = service(db.clone(), moodle);
    sync.sync_courses().await.expect("course sync failed");
    let report = sync
        .sync_users_and_grades()
        .await
        .expect("grade sync failed");

    assert_eq!(report.new_students, 2);
    assert_eq!(report.grades_processed, 3);

    let students = repository::fetch_students(&db).await.unwrap();
    assert_eq!(students.len(), 2);
    assert_eq!(students.iter().filter(|s| s.moodle_user_id == 100).count(), 1);

    let enrollments = repository::fetch_enrollments(&db).await.unwrap();
    assert_eq!(enrollments.len(), 3);
    let alice_rust = enrollments
        .iter()
        .find(|e| e.moodle_user_id == 100 && e.grade == Some(80.0))
        .expect("alice's final grade missing");
    assert_eq!(alice_rust.max_grade, Some(100.0));
}

#[tokio::test]
async fn test_second_grade_sync_updates_records_in_place() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(2, "Rust", &[])]);
    moodle.enroll(2, vec![user(100, "alice")]);
    moodle.set_grades(100, 2, vec![course_total(40.0, 100.0)]);

    let sync = service(db.clone(), moodle.clone());
    sync.sync_courses().await.expect("course sync failed");
    sync.sync_users_and_grades().await.expect("first grade sync failed");
    let first = repository::fetch_enrollments(&db).await.unwrap();

    moodle.set_grades(100, 2, vec![course_total(75.0, 100.0)]);
    let report = sync
        .sync_users_and_grades()
        .await
        .expect("second grade sync failed");
    let second = repository::fetch_enrollments(&db).await.unwrap();

    assert_eq!(report.new_students, 0);
    assert_eq!(report.grades_processed, 1);
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].grade, Some(75.0));
    assert_eq!(repository::fetch_students(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_without_course_total_gets_no_grade_record() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(2, "Rust", &[])]);
    moodle.enroll(2, vec![user(100, "alice")]);
    moodle.set_grades(100, 2, vec![quiz("Quiz 1", 3.0)]);

    let sync = service(db.clone(), moodle);
    sync.sync_courses().await.expect("course sync failed");
    let report = sync
        .sync_users_and_grades()
        .await
        .expect("grade sync failed");

    assert_eq!(report.new_students, 1);
    assert_eq!(report.grades_processed, 0);
    assert!(repository::fetch_enrollments(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ungraded_course_total_keeps_empty_grade() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(2, "Rust", &[])]);
    moodle.enroll(2, vec![user(100, "alice")]);
    let mut total = course_total(0.0, 100.0);
    total.raw_grade = None;
    moodle.set_grades(100, 2, vec![total]);

    let sync = service(db.clone(), moodle);
    sync.sync_courses().await.expect("course sync failed");
    sync.sync_users_and_grades().await.expect("grade sync failed");

    let enrollments = repository::fetch_enrollments(&db).await.unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].grade, None);
    assert_eq!(enrollments[0].max_grade, Some(100.0));
}

#[tokio::test]
async fn test_recommender_reloaded_after_grades_change() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::new());
    moodle.set_courses(vec![course(2, "Rust", &[])]);
    moodle.enroll(2, vec![user(100, "alice")]);
    moodle.set_grades(100, 2, vec![course_total(40.0, 100.0)]);
    let recommender = Arc::new(FakeRecommender::default());

    let sync = service(db, moodle).with_recommender(recommender.clone());
    sync.sync_all().await.expect("full sync failed");

    assert_eq!(recommender.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fan_out_respects_concurrency_ceiling() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::with_latency(Duration::from_millis(15)));
    let courses = (2..14).map(|id| course(id, "Course", &[])).collect();
    moodle.set_courses(courses);
    for id in 2..14 {
        moodle.enroll(id, vec![user(1000 + id, "learner")]);
    }

    let config = SyncConfig {
        fetch_concurrency: 3,
        ..SyncConfig::default()
    };
    let sync = SyncService::new(db.clone(), moodle.clone(), config);
    sync.sync_courses().await.expect("course sync failed");
    let report = sync
        .sync_users_and_grades()
        .await
        .expect("grade sync failed");

    assert_eq!(report.new_students, 12);
    assert!(moodle.peak_concurrency() <= 3);
    assert_eq!(moodle.grade_calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn test_overlapping_grade_syncs_do_not_collide() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::with_latency(Duration::from_millis(20)));
    moodle.set_courses(vec![course(42, "Intro to Testing", &["qa"])]);
    moodle.enroll(42, vec![user(100, "alice")]);
    moodle.set_grades(100, 42, vec![course_total(70.0, 100.0)]);
    service(db.clone(), moodle.clone())
        .sync_courses()
        .await
        .expect("course sync failed");

    let lock = Arc::new(Mutex::new(()));
    let first = service(db.clone(), moodle.clone()).with_pass_lock(lock.clone());
    let second = service(db.clone(), moodle).with_pass_lock(lock);

    let (a, b) = tokio::join!(
        first.sync_users_and_grades(),
        second.sync_users_and_grades()
    );
    let a = a.expect("first grade sync failed");
    let b = b.expect("second grade sync failed");

    assert_eq!(a.new_students + b.new_students, 1);
    assert_eq!(a.grades_processed, 1);
    assert_eq!(b.grades_processed, 1);
    assert_eq!(repository::fetch_students(&db).await.unwrap().len(), 1);
    assert_eq!(repository::fetch_enrollments(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlapping_course_syncs_do_not_collide() {
    let db = setup_db().await;
    let moodle = Arc::new(FakeMoodle::with_latency(Duration::from_millis(20)));
    moodle.set_courses(vec![course(42, "Intro to Testing", &["qa"])]);

    let lock = Arc::new(Mutex::new(()));
    let first = service(db.clone(), moodle.clone()).with_pass_lock(lock.clone());
    let second = service(db.clone(), moodle).with_pass_lock(lock);

    let (a, b) = tokio::join!(first.sync_courses(), second.sync_courses());
    let a = a.expect("first course sync failed");
    let b = b.expect("second course sync failed");

    assert_eq!(a.added + b.added, 1);
    assert_eq!(a.updated + b.updated, 1);
    assert_eq!(repository::fetch_courses(&db).await.unwrap().len(), 1);
}
