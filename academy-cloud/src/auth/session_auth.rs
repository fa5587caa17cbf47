//! Session JWT authentication (tokens issued by the auth service)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::UserRole;

use super::UserIdentity;
use crate::state::AppState;

/// JWT claims for an authenticated user
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub name: String,
    /// "admin" | "user"
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a session JWT for a user
pub fn create_token(
    identity: &UserIdentity,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = SessionClaims {
        sub: identity.user_id.clone(),
        email: identity.email.clone(),
        name: identity.name.clone(),
        role: identity.role.as_db().to_string(),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and verify a bearer token
pub fn verify_token(token: &str, secret: &str) -> Result<UserIdentity, AppError> {
    let token_data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid or expired token"),
        }
    })?;

    let claims = token_data.claims;
    let role = UserRole::from_db(&claims.role)
        .ok_or_else(|| AppError::invalid_token("Unknown role in token"))?;

    Ok(UserIdentity {
        user_id: claims.sub,
        email: claims.email,
        name: claims.name,
        role,
    })
}

fn bearer_identity(request: &Request, secret: &str) -> Result<UserIdentity, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::not_authenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format"))?;

    verify_token(token, secret)
}

/// Middleware: any signed-in user
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let identity =
        bearer_identity(&request, &state.jwt_secret).map_err(IntoResponse::into_response)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Middleware: signed-in admin only
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let identity =
        bearer_identity(&request, &state.jwt_secret).map_err(IntoResponse::into_response)?;
    if !identity.is_admin() {
        tracing::warn!(user_id = %identity.user_id, "Admin route denied");
        return Err(AppError::admin_required().into_response());
    }
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
