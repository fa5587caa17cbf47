//! Public course catalog

use axum::extract::{Path, State};
use shared::error::ApiResponse;
use shared::models::{Course, CourseDetail};

use super::ApiResult;
use crate::services::catalog;
use crate::state::AppState;

/// GET /api/courses
pub async fn list_courses(State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    let courses = catalog::list_published(&state).await?;
    Ok(ApiResponse::success(courses))
}

/// GET /api/courses/{slug}
pub async fn course_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<CourseDetail> {
    let detail = catalog::course_detail(&state, &slug).await?;
    Ok(ApiResponse::success(detail))
}
