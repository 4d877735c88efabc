pub mod course;
pub mod enrollment;
pub mod report;
pub mod student;

pub use course::{Course, Difficulty, MOODLE_PLATFORM, merge_topics};
pub use enrollment::Enrollment;
pub use report::{CourseSyncReport, GradeSyncReport};
pub use student::{NewStudent, Student};
