use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Last known grade of one student in one course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub moodle_user_id: i64,
    pub course_id: String,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub last_synced: String,
}
