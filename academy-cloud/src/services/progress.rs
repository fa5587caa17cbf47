//! Progress Tracker
//!
//! Completion is stored per (user, lesson); course progress is always derived
//! from the lesson and progress rows, never cached.

use async_trait::async_trait;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CourseProgress, EnrolledCourse, EnrollmentStatus, Lesson, LessonContent, LessonProgress,
    ToggleResult,
};

use super::catalog::require_course;
use super::enrollment::EnrollmentStore;
use super::structure::{StructureStore, chapter_not_found, lesson_not_found};
use crate::auth::UserIdentity;
use crate::error::ServiceResult;
use crate::state::AppState;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> ServiceResult<Option<LessonProgress>>;

    /// Insert on first toggle, update afterwards
    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> ServiceResult<LessonProgress>;

    /// `(total lessons in the course, lessons the user completed)`
    async fn count_course_progress(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> ServiceResult<(i64, i64)>;
}

/// Course that owns `lesson_id`, with the lesson itself
async fn lesson_with_course(state: &AppState, lesson_id: &str) -> ServiceResult<(Lesson, String)> {
    let lesson = state
        .store
        .find_lesson(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    let chapter = state
        .store
        .find_chapter(&lesson.chapter_id)
        .await?
        .ok_or_else(|| chapter_not_found(&lesson.chapter_id))?;
    Ok((lesson, chapter.course_id))
}

/// The caller must hold an Active enrollment in the course
async fn require_active_enrollment(
    state: &AppState,
    user_id: &str,
    course_id: &str,
) -> ServiceResult<()> {
    let active = state
        .store
        .find_enrollment(user_id, course_id)
        .await?
        .is_some_and(|e| e.status == EnrollmentStatus::Active);
    if !active {
        return Err(AppError::new(ErrorCode::NotEnrolled)
            .with_detail("course_id", course_id.to_string())
            .into());
    }
    Ok(())
}

/// Flip the completion flag of one lesson for the caller.
///
/// A missing row counts as not completed. Concurrent toggles of the same pair
/// resolve last-writer-wins through the upsert.
pub async fn toggle_lesson_complete(
    state: &AppState,
    identity: &UserIdentity,
    lesson_id: &str,
) -> ServiceResult<ToggleResult> {
    let (lesson, course_id) = lesson_with_course(state, lesson_id).await?;
    require_active_enrollment(state, &identity.user_id, &course_id).await?;

    let current = state
        .store
        .find_progress(&identity.user_id, &lesson.id)
        .await?
        .is_some_and(|p| p.completed);
    let row = state
        .store
        .upsert_progress(&identity.user_id, &lesson.id, !current)
        .await?;

    tracing::info!(
        user_id = %identity.user_id,
        lesson_id = %lesson.id,
        completed = row.completed,
        "Lesson completion toggled"
    );
    Ok(ToggleResult {
        completed: row.completed,
    })
}

pub async fn compute_progress(
    state: &AppState,
    user_id: &str,
    course_id: &str,
) -> ServiceResult<CourseProgress> {
    require_course(&*state.store, course_id).await?;
    let (total, completed) = state.store.count_course_progress(course_id, user_id).await?;
    Ok(CourseProgress::new(total, completed))
}

/// Progress of the caller in one course
pub async fn course_progress(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
) -> ServiceResult<CourseProgress> {
    compute_progress(state, &identity.user_id, course_id).await
}

/// Lesson with the caller's completion flag; enrolled learners only
pub async fn lesson_content(
    state: &AppState,
    identity: &UserIdentity,
    lesson_id: &str,
) -> ServiceResult<LessonContent> {
    let (lesson, course_id) = lesson_with_course(state, lesson_id).await?;
    require_active_enrollment(state, &identity.user_id, &course_id).await?;
    let completed = state
        .store
        .find_progress(&identity.user_id, lesson_id)
        .await?
        .is_some_and(|p| p.completed);
    Ok(LessonContent {
        lesson,
        course_id,
        completed,
    })
}

/// Actively enrolled courses of the caller with their progress
pub async fn dashboard(
    state: &AppState,
    identity: &UserIdentity,
) -> ServiceResult<Vec<EnrolledCourse>> {
    let courses = state.store.list_active_courses(&identity.user_id).await?;
    let mut out = Vec::with_capacity(courses.len());
    for course in courses {
        let (total, completed) = state
            .store
            .count_course_progress(&course.id, &identity.user_id)
            .await?;
        out.push(EnrolledCourse {
            course,
            progress: CourseProgress::new(total, completed),
        });
    }
    Ok(out)
}
