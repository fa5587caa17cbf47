//! API routes for academy-cloud

pub mod admin;
pub mod catalog;
pub mod health;
pub mod learner;
pub mod stripe_webhook;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::error::{ApiResponse, AppError};
use tower_http::trace::TraceLayer;

use crate::auth::session_auth::{require_admin, require_user};
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Public catalog (no auth)
    let public = Router::new()
        .route("/api/courses", get(catalog::list_courses))
        .route("/api/courses/{slug}", get(catalog::course_detail));

    // Signed-in learners
    let learner = Router::new()
        .route("/api/me/courses", get(learner::dashboard))
        .route("/api/me/courses/{course_id}/enroll", post(learner::enroll))
        .route(
            "/api/me/courses/{course_id}/progress",
            get(learner::course_progress),
        )
        .route("/api/me/lessons/{lesson_id}", get(learner::lesson_content))
        .route(
            "/api/me/lessons/{lesson_id}/complete",
            post(learner::toggle_complete),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let admin = admin::router().layer(middleware::from_fn_with_state(
        state.clone(),
        require_admin,
    ));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route("/stripe/webhook", post(stripe_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(public)
        .merge(learner)
        .merge(admin)
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
