//! Stripe webhook handler
//!
//! POST /stripe/webhook: checkout confirmations (raw body for signature verification)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::error::ServiceResult;
use crate::services::enrollment::{self, PaidSession, WebhookEvents};
use crate::state::AppState;
use crate::stripe;

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) =
        stripe::verify_webhook_signature(&body, sig_header, &state.stripe_webhook_secret)
    {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    let Some(event_id) = event["id"].as_str() else {
        tracing::warn!("Webhook event missing id");
        return StatusCode::BAD_REQUEST;
    };
    tracing::info!(event_id, event_type, "Received Stripe webhook");

    // Insert first, then handle: a redelivered event is acknowledged without side effects
    match state.store.mark_event(event_id, event_type).await {
        Ok(false) => {
            tracing::info!(event_id, "Duplicate webhook event, skipping");
            return StatusCode::OK;
        }
        Ok(true) => {}
        Err(e) => {
            tracing::error!(error = %e, "DB error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    let outcome = match event_type {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            handle_checkout_completed(&state, &event).await
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            handle_checkout_expired(&state, &event).await
        }
        _ => {
            tracing::debug!(event_type, "Unhandled webhook event type");
            Ok(())
        }
    };

    match outcome {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(event_id, event_type, error = %e, "Webhook handling failed");
            // Let Stripe's retry reprocess the event
            if let Err(e) = state.store.forget_event(event_id).await {
                tracing::error!(event_id, error = %e, "Failed to release webhook event");
            }
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Checkout session metadata value
fn session_metadata<'a>(event: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    event
        .pointer("/data/object/metadata")
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
}

/// Enrollment ID the checkout session was created for
fn session_enrollment_id(event: &serde_json::Value) -> Option<&str> {
    session_metadata(event, "enrollment_id")
}

/// checkout.session.completed → activate the enrollment
async fn handle_checkout_completed(state: &AppState, event: &serde_json::Value) -> ServiceResult<()> {
    let Some(enrollment_id) = session_enrollment_id(event) else {
        tracing::warn!("Checkout session without enrollment metadata");
        return Ok(());
    };

    // Delayed payment methods complete the session before the money arrives
    let payment_status = event
        .pointer("/data/object/payment_status")
        .and_then(|v| v.as_str());
    if payment_status.is_some_and(|s| s == "unpaid") {
        tracing::info!(enrollment_id, "Checkout completed, payment still pending");
        return Ok(());
    }

    let paid = PaidSession {
        enrollment_id,
        user_id: session_metadata(event, "user_id"),
        course_id: session_metadata(event, "course_id"),
    };
    enrollment::confirm_payment(state, &paid).await?;
    Ok(())
}

/// checkout.session.expired → Pending becomes Cancelled
async fn handle_checkout_expired(state: &AppState, event: &serde_json::Value) -> ServiceResult<()> {
    let Some(enrollment_id) = session_enrollment_id(event) else {
        tracing::warn!("Checkout session without enrollment metadata");
        return Ok(());
    };
    enrollment::expire_checkout(state, enrollment_id).await?;
    Ok(())
}
