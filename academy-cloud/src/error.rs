//! Unified service-layer error type for academy-cloud
//!
//! `ServiceError` bridges infrastructure failures (`sqlx::Error`, Stripe, S3)
//! and the API-layer error (`AppError`). Infrastructure causes are logged
//! here and replaced by a generic message before reaching the client.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Database error; committed state is untouched
    Db(BoxError),
    /// Payment provider call failed
    Payment(BoxError),
    /// Object storage call failed
    Storage(BoxError),
    /// Business-rule error (already an AppError with the correct ErrorCode)
    App(AppError),
}

impl ServiceError {
    pub fn payment(e: impl Into<BoxError>) -> Self {
        ServiceError::Payment(e.into())
    }

    pub fn storage(e: impl Into<BoxError>) -> Self {
        ServiceError::Storage(e.into())
    }

    /// Error code the client will see
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Db(_) => ErrorCode::DatabaseError,
            ServiceError::Payment(_) => ErrorCode::PaymentProviderError,
            ServiceError::Storage(_) => ErrorCode::StorageError,
            ServiceError::App(e) => e.code,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Db(e) => write!(f, "database: {e}"),
            ServiceError::Payment(e) => write!(f, "payment provider: {e}"),
            ServiceError::Storage(e) => write!(f, "storage: {e}"),
            ServiceError::App(e) => write!(f, "{e}"),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(err) => {
                tracing::error!(error = %err, "Service database error");
                AppError::database()
            }
            ServiceError::Payment(err) => {
                tracing::error!(error = %err, "Payment provider error");
                AppError::new(ErrorCode::PaymentProviderError)
            }
            ServiceError::Storage(err) => {
                tracing::error!(error = %err, "Object storage error");
                AppError::new(ErrorCode::StorageError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
