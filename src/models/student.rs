use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A Moodle account mirrored locally. Only created by the grade sync,
/// never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub moodle_user_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub moodle_user_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
}
