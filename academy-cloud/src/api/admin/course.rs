use axum::extract::{Path, State};
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::models::{Course, CourseDetail, CourseInput};

use crate::api::ApiResult;
use crate::auth::{ClientInfo, UserIdentity};
use crate::services::catalog;
use crate::state::AppState;

/// GET /api/admin/courses
pub async fn list_courses(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Vec<Course>> {
    let courses = catalog::admin_list(&state, &identity).await?;
    Ok(ApiResponse::success(courses))
}

/// POST /api/admin/courses
pub async fn create_course(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Json(input): Json<CourseInput>,
) -> ApiResult<Course> {
    let course = catalog::create_course(&state, &identity, &client, &input).await?;
    Ok(ApiResponse::success_with_message("Course created", course))
}

/// GET /api/admin/courses/{course_id}
pub async fn get_course(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_id): Path<String>,
) -> ApiResult<CourseDetail> {
    let detail = catalog::admin_course(&state, &identity, &course_id).await?;
    Ok(ApiResponse::success(detail))
}

/// PUT /api/admin/courses/{course_id}
pub async fn update_course(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Path(course_id): Path<String>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Course> {
    let course = catalog::update_course(&state, &identity, &client, &course_id, &input).await?;
    Ok(ApiResponse::success_with_message("Course updated", course))
}

/// DELETE /api/admin/courses/{course_id}
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Path(course_id): Path<String>,
) -> ApiResult<()> {
    catalog::delete_course(&state, &identity, &client, &course_id).await?;
    Ok(ApiResponse::message("Course deleted"))
}
