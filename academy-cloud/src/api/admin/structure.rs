//! Chapter and lesson editing

use axum::extract::{Path, State};
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::models::{
    Chapter, ChapterInput, Lesson, LessonInput, MoveItemRequest, PositionAssignment,
    ReorderRequest,
};

use crate::api::ApiResult;
use crate::auth::UserIdentity;
use crate::services::{reorder, structure};
use crate::state::AppState;

pub async fn create_chapter(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_id): Path<String>,
    Json(input): Json<ChapterInput>,
) -> ApiResult<Chapter> {
    let chapter = structure::create_chapter(&state, &identity, &course_id, &input).await?;
    Ok(ApiResponse::success_with_message("Chapter created", chapter))
}

pub async fn reorder_chapters(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<()> {
    reorder::reorder_chapters(&state, &identity, &course_id, &req).await?;
    Ok(ApiResponse::message("Chapters reordered"))
}

pub async fn move_chapter(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_id): Path<String>,
    Json(req): Json<MoveItemRequest>,
) -> ApiResult<Vec<PositionAssignment>> {
    let order = reorder::move_chapter(&state, &identity, &course_id, &req).await?;
    Ok(ApiResponse::success_with_message("Chapters reordered", order))
}

pub async fn update_chapter(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id)): Path<(String, String)>,
    Json(input): Json<ChapterInput>,
) -> ApiResult<Chapter> {
    let chapter =
        structure::rename_chapter(&state, &identity, &course_id, &chapter_id, &input).await?;
    Ok(ApiResponse::success_with_message("Chapter updated", chapter))
}

pub async fn delete_chapter(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id)): Path<(String, String)>,
) -> ApiResult<()> {
    structure::delete_chapter(&state, &identity, &course_id, &chapter_id).await?;
    Ok(ApiResponse::message("Chapter deleted"))
}

pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id)): Path<(String, String)>,
    Json(input): Json<LessonInput>,
) -> ApiResult<Lesson> {
    let lesson =
        structure::create_lesson(&state, &identity, &course_id, &chapter_id, &input).await?;
    Ok(ApiResponse::success_with_message("Lesson created", lesson))
}

pub async fn reorder_lessons(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id)): Path<(String, String)>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<()> {
    reorder::reorder_lessons(&state, &identity, &course_id, &chapter_id, &req).await?;
    Ok(ApiResponse::message("Lessons reordered"))
}

pub async fn move_lesson(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id)): Path<(String, String)>,
    Json(req): Json<MoveItemRequest>,
) -> ApiResult<Vec<PositionAssignment>> {
    let order = reorder::move_lesson(&state, &identity, &course_id, &chapter_id, &req).await?;
    Ok(ApiResponse::success_with_message("Lessons reordered", order))
}

pub async fn update_lesson(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
    Json(input): Json<LessonInput>,
) -> ApiResult<Lesson> {
    let lesson = structure::update_lesson(
        &state,
        &identity,
        &course_id,
        &chapter_id,
        &lesson_id,
        &input,
    )
    .await?;
    Ok(ApiResponse::success_with_message("Lesson updated", lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult<()> {
    structure::delete_lesson(&state, &identity, &course_id, &chapter_id, &lesson_id).await?;
    Ok(ApiResponse::message("Lesson deleted"))
}
