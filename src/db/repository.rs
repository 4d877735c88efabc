use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{Course, Enrollment, NewStudent, Student};

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"
        SELECT id, external_id, title, description, platform, difficulty, topics
        FROM courses
        ORDER BY title ASC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn insert_course(conn: &mut SqliteConnection, course: &Course) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courses
            (id, external_id, title, description, platform, difficulty, topics)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&course.id)
    .bind(&course.external_id)
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.platform)
    .bind(course.difficulty)
    .bind(Json(&course.topics))
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrites the mutable columns of a course. `external_id` and `platform`
/// never change once inserted.
pub async fn update_course(conn: &mut SqliteConnection, course: &Course) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE courses
        SET title = ?1,
            description = ?2,
            difficulty = ?3,
            topics = ?4
        WHERE id = ?5
        "#,
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(course.difficulty)
    .bind(Json(&course.topics))
    .bind(&course.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn fetch_students(db: &SqlitePool) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        "SELECT id, moodle_user_id, username, email, full_name FROM students ORDER BY id ASC",
    )
    .fetch_all(db)
    .await
}

pub async fn insert_student(
    conn: &mut SqliteConnection,
    student: &NewStudent,
) -> Result<Student, sqlx::Error> {
    let id = sqlx::query(
        r#"
        INSERT INTO students (moodle_user_id, username, email, full_name)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(student.moodle_user_id)
    .bind(&student.username)
    .bind(&student.email)
    .bind(&student.full_name)
    .execute(conn)
    .await?
    .last_insert_rowid();

    Ok(Student {
        id,
        moodle_user_id: student.moodle_user_id,
        username: student.username.clone(),
        email: student.email.clone(),
        full_name: student.full_name.clone(),
    })
}

pub async fn fetch_enrollments(db: &SqlitePool) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT
            uc.id,
            uc.student_id,
            s.moodle_user_id,
            uc.course_id,
            uc.grade,
            uc.max_grade,
            uc.last_synced
        FROM user_courses uc
        INNER JOIN students s ON s.id = uc.student_id
        ORDER BY uc.id ASC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn insert_enrollment(
    conn: &mut SqliteConnection,
    student_id: i64,
    course_id: &str,
    grade: Option<f64>,
    max_grade: Option<f64>,
    synced_at: &str,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query(
        r#"
        INSERT INTO user_courses (student_id, course_id, grade, max_grade, last_synced)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(grade)
    .bind(max_grade)
    .bind(synced_at)
    .execute(conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update_enrollment(
    conn: &mut SqliteConnection,
    id: i64,
    grade: Option<f64>,
    max_grade: Option<f64>,
    synced_at: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE user_courses
        SET grade = ?1,
            max_grade = ?2,
            last_synced = ?3
        WHERE id = ?4
        "#,
    )
    .bind(grade)
    .bind(max_grade)
    .bind(synced_at)
    .bind(id)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}
