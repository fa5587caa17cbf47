//! Direct-to-storage uploads for course covers, lesson videos and thumbnails

use shared::models::{UploadRequest, UploadTicket};

use super::structure::StructureStore;
use crate::auth::{ClientInfo, ShieldRule, UserIdentity};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::storage::upload_key;

/// Validate the file and hand out a presigned PUT URL under a fresh key
pub async fn presign_upload(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    req: &UploadRequest,
) -> ServiceResult<UploadTicket> {
    super::require_admin(identity)?;
    state
        .shield
        .protect(ShieldRule::UPLOAD, &identity.user_id, client)
        .await
        .into_result()?;
    req.validate()?;

    let key = upload_key(&req.file_name);
    let presigned_url = state
        .objects
        .presign_put(&key, &req.content_type, req.size)
        .await
        .map_err(ServiceError::storage)?;

    tracing::info!(key = %key, size = req.size, "Upload presigned");
    Ok(UploadTicket { presigned_url, key })
}

/// Delete an uploaded object and detach it from any lesson
pub async fn delete_upload(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    key: &str,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    state
        .shield
        .protect(ShieldRule::UPLOAD, &identity.user_id, client)
        .await
        .into_result()?;
    if key.trim().is_empty() {
        return Err(shared::error::AppError::validation("Key is required")
            .with_detail("field", "key")
            .into());
    }

    state
        .objects
        .delete_object(key)
        .await
        .map_err(ServiceError::storage)?;
    let cleared = state.store.clear_asset_references(key).await?;
    tracing::info!(key, lessons = cleared, "Object deleted");
    Ok(())
}
