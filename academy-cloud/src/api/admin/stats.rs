use axum::Extension;
use axum::extract::State;
use shared::error::ApiResponse;
use shared::models::EnrollmentDayCount;

use crate::api::ApiResult;
use crate::auth::UserIdentity;
use crate::services::enrollment;
use crate::state::AppState;

/// GET /api/admin/stats/enrollments
pub async fn enrollments(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Vec<EnrollmentDayCount>> {
    let days = enrollment::enrollment_stats(&state, &identity).await?;
    Ok(ApiResponse::success(days))
}
