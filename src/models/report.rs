use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseSyncReport {
    pub added: usize,
    pub updated: usize,
}

impl CourseSyncReport {
    pub fn summary(&self) -> String {
        format!(
            "Course sync finished.\nAdded: {}\nUpdated: {}",
            self.added, self.updated
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GradeSyncReport {
    pub new_students: usize,
    pub grades_processed: usize,
}

impl GradeSyncReport {
    pub fn summary(&self) -> String {
        format!(
            "Student and grade sync finished.\nNew students: {}\nGrades processed: {}",
            self.new_students, self.grades_processed
        )
    }
}
