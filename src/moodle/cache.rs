use dashmap::DashMap;

/// Course tags keyed by Moodle course id, kept for the life of the process.
///
/// Safe to share between concurrent fetches; the last write for a course wins.
#[derive(Debug, Default)]
pub struct TagCache {
    entries: DashMap<i64, Vec<String>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, course_id: i64) -> Option<Vec<String>> {
        self.entries.get(&course_id).map(|tags| tags.value().clone())
    }

    pub fn insert(&self, course_id: i64, tags: Vec<String>) {
        self.entries.insert(course_id, tags);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
