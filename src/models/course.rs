use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const MOODLE_PLATFORM: &str = "Moodle";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Difficulty {
    #[default]
    Beginner,
    Advanced,
}

impl Difficulty {
    /// Word-match heuristic: any topic mentioning "hard" or "advanced"
    /// (case-insensitive) lifts the course to `Advanced`.
    pub fn classify<S: AsRef<str>>(topics: &[S]) -> Self {
        let elevated = topics.iter().any(|topic| {
            let topic = topic.as_ref().to_lowercase();
            topic.contains("hard") || topic.contains("advanced")
        });

        if elevated {
            Difficulty::Advanced
        } else {
            Difficulty::Beginner
        }
    }
}

/// Union of two topic lists, keeping the first occurrence of each string.
pub fn merge_topics(tags: &[String], topics: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(tags.len() + topics.len());
    for topic in tags.iter().chain(topics) {
        if !merged.contains(topic) {
            merged.push(topic.clone());
        }
    }
    merged
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub platform: String,
    pub difficulty: Difficulty,
    #[sqlx(json)]
    pub topics: Vec<String>,
}
