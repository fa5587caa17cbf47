use axum::extract::State;
use axum::{Extension, Json};
use shared::error::ApiResponse;
use shared::models::{DeleteObjectRequest, UploadRequest, UploadTicket};

use crate::api::ApiResult;
use crate::auth::{ClientInfo, UserIdentity};
use crate::services::uploads;
use crate::state::AppState;

/// POST /api/admin/uploads
pub async fn presign(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Json(req): Json<UploadRequest>,
) -> ApiResult<UploadTicket> {
    let ticket = uploads::presign_upload(&state, &identity, &client, &req).await?;
    Ok(ApiResponse::success(ticket))
}

/// DELETE /api/admin/uploads
pub async fn delete_object(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    client: ClientInfo,
    Json(req): Json<DeleteObjectRequest>,
) -> ApiResult<()> {
    uploads::delete_upload(&state, &identity, &client, &req.key).await?;
    Ok(ApiResponse::message("File deleted"))
}
