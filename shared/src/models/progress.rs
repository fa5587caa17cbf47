//! Lesson progress models

use serde::{Deserialize, Serialize};

use super::course::Course;
use super::structure::Lesson;

/// Completion row, unique per (user, lesson)
///
/// Absence of a row means "not started".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LessonProgress {
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of toggling a lesson
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleResult {
    pub completed: bool,
}

/// Derived completion summary of one course for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseProgress {
    pub total_lessons: i64,
    pub completed_lessons: i64,
    /// 0..=100, rounded half up
    pub percentage: i64,
}

impl CourseProgress {
    pub fn new(total_lessons: i64, completed_lessons: i64) -> Self {
        Self {
            total_lessons,
            completed_lessons,
            percentage: percentage(completed_lessons, total_lessons),
        }
    }
}

/// round(completed / total * 100) with halves rounded up; 0 when total is 0
pub fn percentage(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    (completed * 200 + total) / (total * 2)
}

/// Lesson as seen by an enrolled learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub course_id: String,
    pub completed: bool,
}

/// Dashboard row: an active enrollment with its progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledCourse {
    pub course: Course,
    pub progress: CourseProgress,
}
