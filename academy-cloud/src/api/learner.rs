//! Signed-in learner endpoints: checkout, progress, lesson content

use axum::Extension;
use axum::extract::{Path, State};
use shared::error::ApiResponse;
use shared::models::{CheckoutOutcome, CourseProgress, EnrolledCourse, LessonContent, ToggleResult};

use super::ApiResult;
use crate::auth::{ClientInfo, UserIdentity};
use crate::services::{enrollment, progress};
use crate::state::AppState;

/// POST /api/me/courses/{course_id}/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Path(course_id): Path<String>,
) -> ApiResult<CheckoutOutcome> {
    let outcome = enrollment::enroll_in_course(&state, &identity, &client, &course_id).await?;
    let message = match &outcome {
        CheckoutOutcome::Redirect { .. } => "Redirecting to checkout",
        CheckoutOutcome::AlreadyEnrolled { .. } => "You are already enrolled in this course",
    };
    Ok(ApiResponse::success_with_message(message, outcome))
}

/// GET /api/me/courses
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Vec<EnrolledCourse>> {
    let courses = progress::dashboard(&state, &identity).await?;
    Ok(ApiResponse::success(courses))
}

/// GET /api/me/courses/{course_id}/progress
pub async fn course_progress(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_id): Path<String>,
) -> ApiResult<CourseProgress> {
    let p = progress::course_progress(&state, &identity, &course_id).await?;
    Ok(ApiResponse::success(p))
}

/// GET /api/me/lessons/{lesson_id}
pub async fn lesson_content(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(lesson_id): Path<String>,
) -> ApiResult<LessonContent> {
    let content = progress::lesson_content(&state, &identity, &lesson_id).await?;
    Ok(ApiResponse::success(content))
}

/// POST /api/me/lessons/{lesson_id}/complete
pub async fn toggle_complete(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(lesson_id): Path<String>,
) -> ApiResult<ToggleResult> {
    let result = progress::toggle_lesson_complete(&state, &identity, &lesson_id).await?;
    let message = if result.completed {
        "Lesson marked as completed"
    } else {
        "Lesson marked as not completed"
    };
    Ok(ApiResponse::success_with_message(message, result))
}
