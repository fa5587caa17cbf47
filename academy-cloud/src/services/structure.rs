//! Chapter and lesson authoring
//!
//! Creates append at the end of the sibling group; deletes renumber the
//! remaining siblings in the same transaction. Superseded asset keys are
//! handed to the janitor only after the write committed.

use async_trait::async_trait;

use shared::error::{AppError, ErrorCode};
use shared::models::{Chapter, ChapterInput, ChapterOutline, Lesson, LessonInput};

use crate::auth::UserIdentity;
use crate::error::ServiceResult;
use crate::state::AppState;

#[async_trait]
pub trait StructureStore: Send + Sync {
    /// Chapters of a course with their lessons, both ordered by position
    async fn course_outline(&self, course_id: &str) -> ServiceResult<Vec<ChapterOutline>>;

    async fn find_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Chapter>>;

    async fn find_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>>;

    /// Append a chapter at position N+1; `CourseNotFound` if the course is gone
    async fn create_chapter(&self, course_id: &str, input: &ChapterInput)
    -> ServiceResult<Chapter>;

    async fn rename_chapter(&self, chapter_id: &str, title: &str)
    -> ServiceResult<Option<Chapter>>;

    /// Delete a chapter with its lessons and renumber the remaining chapters.
    ///
    /// Returns the asset keys of the removed lessons, `None` if the chapter is absent.
    async fn delete_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Vec<String>>>;

    /// Append a lesson at position N+1; `ChapterNotFound` if the chapter is gone
    async fn create_lesson(&self, chapter_id: &str, input: &LessonInput) -> ServiceResult<Lesson>;

    /// Returns `(before, after)`, `None` if the lesson is absent
    async fn update_lesson(
        &self,
        lesson_id: &str,
        input: &LessonInput,
    ) -> ServiceResult<Option<(Lesson, Lesson)>>;

    /// Delete a lesson and renumber the remaining lessons of its chapter
    async fn delete_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>>;

    /// Null out lesson columns that reference `key`; returns the number of lessons touched
    async fn clear_asset_references(&self, key: &str) -> ServiceResult<u64>;
}

/// Chapter that belongs to `course_id`
pub async fn scoped_chapter<S: StructureStore + ?Sized>(
    store: &S,
    course_id: &str,
    chapter_id: &str,
) -> ServiceResult<Chapter> {
    match store.find_chapter(chapter_id).await? {
        Some(chapter) if chapter.course_id == course_id => Ok(chapter),
        _ => Err(chapter_not_found(chapter_id).into()),
    }
}

/// Lesson that belongs to `chapter_id`, itself part of `course_id`
pub async fn scoped_lesson<S: StructureStore + ?Sized>(
    store: &S,
    course_id: &str,
    chapter_id: &str,
    lesson_id: &str,
) -> ServiceResult<Lesson> {
    scoped_chapter(store, course_id, chapter_id).await?;
    match store.find_lesson(lesson_id).await? {
        Some(lesson) if lesson.chapter_id == chapter_id => Ok(lesson),
        _ => Err(lesson_not_found(lesson_id).into()),
    }
}

pub fn chapter_not_found(chapter_id: &str) -> AppError {
    AppError::new(ErrorCode::ChapterNotFound).with_detail("chapter_id", chapter_id.to_string())
}

pub fn lesson_not_found(lesson_id: &str) -> AppError {
    AppError::new(ErrorCode::LessonNotFound).with_detail("lesson_id", lesson_id.to_string())
}

pub async fn create_chapter(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    input: &ChapterInput,
) -> ServiceResult<Chapter> {
    super::require_admin(identity)?;
    input.validate()?;
    let chapter = state.store.create_chapter(course_id, input).await?;
    tracing::info!(course_id, chapter_id = %chapter.id, position = chapter.position, "Chapter created");
    Ok(chapter)
}

pub async fn rename_chapter(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    input: &ChapterInput,
) -> ServiceResult<Chapter> {
    super::require_admin(identity)?;
    input.validate()?;
    scoped_chapter(&*state.store, course_id, chapter_id).await?;
    state
        .store
        .rename_chapter(chapter_id, input.title.trim())
        .await?
        .ok_or_else(|| chapter_not_found(chapter_id).into())
}

pub async fn delete_chapter(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    scoped_chapter(&*state.store, course_id, chapter_id).await?;
    let released = state
        .store
        .delete_chapter(chapter_id)
        .await?
        .ok_or_else(|| chapter_not_found(chapter_id))?;
    tracing::info!(course_id, chapter_id, "Chapter deleted");

    state.janitor.reconcile(&released, &[]).await;
    Ok(())
}

pub async fn create_lesson(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    input: &LessonInput,
) -> ServiceResult<Lesson> {
    super::require_admin(identity)?;
    input.validate()?;
    scoped_chapter(&*state.store, course_id, chapter_id).await?;
    let lesson = state.store.create_lesson(chapter_id, input).await?;
    tracing::info!(chapter_id, lesson_id = %lesson.id, position = lesson.position, "Lesson created");
    Ok(lesson)
}

pub async fn update_lesson(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    lesson_id: &str,
    input: &LessonInput,
) -> ServiceResult<Lesson> {
    super::require_admin(identity)?;
    input.validate()?;
    scoped_lesson(&*state.store, course_id, chapter_id, lesson_id).await?;
    let (before, after) = state
        .store
        .update_lesson(lesson_id, input)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;

    state
        .janitor
        .reconcile(&before.asset_keys(), &after.asset_keys())
        .await;
    Ok(after)
}

pub async fn delete_lesson(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    lesson_id: &str,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    scoped_lesson(&*state.store, course_id, chapter_id, lesson_id).await?;
    let removed = state
        .store
        .delete_lesson(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    tracing::info!(chapter_id, lesson_id, "Lesson deleted");

    state.janitor.reconcile(&removed.asset_keys(), &[]).await;
    Ok(())
}
