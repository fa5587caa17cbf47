//! Enrollment / Checkout Workflow
//!
//! State machine per (user, course): none -> Pending -> Active, with
//! Pending -> Cancelled when a checkout session expires. Active is terminal.
//!
//! Checkout holds the enrollment row locked while the payment session is
//! created, so concurrent attempts for the same pair serialize and a failed
//! provider call leaves no trace.

use async_trait::async_trait;
use std::collections::BTreeMap;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CheckoutOutcome, Course, CourseStatus, Enrollment, EnrollmentDayCount, EnrollmentStatus,
};
use shared::util::{day_start_millis, now_millis};

use super::catalog::{CourseStore, course_not_found};
use crate::auth::{ClientInfo, ShieldRule, UserIdentity, UserStore};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::stripe::CheckoutSessionRequest;

const DAY_MS: i64 = 86_400_000;
const STATS_DAYS: i64 = 30;

/// Enrollment row locked for the duration of one checkout attempt
#[async_trait]
pub trait PendingCheckout: Send {
    /// Row as staged: newly Pending, refreshed Pending, or untouched Active
    fn enrollment(&self) -> &Enrollment;

    async fn commit(self: Box<Self>) -> ServiceResult<()>;

    /// Discard the staged row (a new row disappears, an existing one is restored)
    async fn rollback(self: Box<Self>) -> ServiceResult<()>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> ServiceResult<Option<Enrollment>>;

    /// Lock the (user, course) enrollment and stage a checkout attempt.
    ///
    /// A missing row is inserted Pending with `amount`; a Pending or Cancelled
    /// row becomes Pending with the new amount and timestamp; an Active row is
    /// left as is.
    async fn begin_checkout(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<Box<dyn PendingCheckout>>;

    /// Pending or Cancelled -> Active; `false` if absent or already Active
    async fn activate_enrollment(&self, enrollment_id: &str) -> ServiceResult<bool>;

    /// Mark the (user, course) enrollment Active, inserting it with `amount`
    /// if missing; `false` if it already was Active
    async fn activate_for(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<bool>;

    /// Pending -> Cancelled; `false` for any other state
    async fn cancel_pending(&self, enrollment_id: &str) -> ServiceResult<bool>;

    /// Courses the user holds an Active enrollment in, newest enrollment first
    async fn list_active_courses(&self, user_id: &str) -> ServiceResult<Vec<Course>>;

    /// Enrollments created since `since` grouped by UTC day, ascending
    async fn enrollment_counts_since(&self, since: i64) -> ServiceResult<Vec<EnrollmentDayCount>>;
}

/// Processed provider events, for at-most-once webhook handling
#[async_trait]
pub trait WebhookEvents: Send + Sync {
    /// Record the event; `false` if it was already recorded
    async fn mark_event(&self, event_id: &str, event_type: &str) -> ServiceResult<bool>;

    /// Drop the record so a redelivery is processed again
    async fn forget_event(&self, event_id: &str) -> ServiceResult<()>;
}

pub fn customer_idempotency_key(user_id: &str) -> String {
    format!("customer-{user_id}")
}

pub fn checkout_idempotency_key(user_id: &str, course_id: &str, enrollment_id: &str) -> String {
    format!("checkout-{user_id}-{course_id}-{enrollment_id}")
}

/// Start (or restart) the paid checkout of a course for the caller
pub async fn enroll_in_course(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    course_id: &str,
) -> ServiceResult<CheckoutOutcome> {
    state
        .shield
        .protect(ShieldRule::CHECKOUT, &identity.user_id, client)
        .await
        .into_result()?;

    let course = state
        .store
        .find_course(course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    let price_id = match (&course.status, &course.stripe_price_id) {
        (CourseStatus::Published, Some(price_id)) => price_id.clone(),
        _ => {
            return Err(AppError::new(ErrorCode::CourseNotPurchasable)
                .with_detail("course_id", course_id.to_string())
                .into());
        }
    };

    if let Some(existing) = state.store.find_enrollment(&identity.user_id, course_id).await?
        && existing.status == EnrollmentStatus::Active
    {
        return Ok(CheckoutOutcome::AlreadyEnrolled {
            enrollment_id: existing.id,
        });
    }

    let customer_id = ensure_customer(state, identity).await?;

    let pending = state
        .store
        .begin_checkout(&identity.user_id, course_id, course.price)
        .await?;
    let enrollment = pending.enrollment().clone();

    if !enrollment.status.can_checkout() {
        pending.rollback().await?;
        return Ok(CheckoutOutcome::AlreadyEnrolled {
            enrollment_id: enrollment.id,
        });
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("user_id".to_string(), identity.user_id.clone());
    metadata.insert("course_id".to_string(), course_id.to_string());
    metadata.insert("enrollment_id".to_string(), enrollment.id.clone());

    let request = CheckoutSessionRequest {
        customer_id,
        price_id,
        success_url: state.payment_success_url.clone(),
        cancel_url: state.payment_cancel_url.clone(),
        metadata,
        idempotency_key: checkout_idempotency_key(&identity.user_id, course_id, &enrollment.id),
    };

    let session = match state.payments.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            if let Err(rollback_err) = pending.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back checkout");
            }
            return Err(ServiceError::payment(e));
        }
    };

    // The session is live now; a paid session without a row is recovered in `confirm_payment`
    if let Err(e) = pending.commit().await {
        tracing::error!(
            enrollment_id = %enrollment.id,
            session_id = %session.id,
            error = %e,
            "Checkout session issued but enrollment not saved"
        );
        return Err(e);
    }
    tracing::info!(
        user_id = %identity.user_id,
        course_id,
        enrollment_id = %enrollment.id,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(CheckoutOutcome::Redirect {
        enrollment_id: enrollment.id,
        checkout_url: session.url,
    })
}

/// Payment-provider customer of the caller, created once and cached on the user row
async fn ensure_customer(state: &AppState, identity: &UserIdentity) -> ServiceResult<String> {
    let user = state.store.ensure_user(identity).await?;
    if let Some(customer_id) = user.stripe_customer_id {
        return Ok(customer_id);
    }

    let customer_id = state
        .payments
        .create_customer(
            &identity.email,
            &identity.name,
            &identity.user_id,
            &customer_idempotency_key(&identity.user_id),
        )
        .await
        .map_err(ServiceError::payment)?;
    state
        .store
        .set_stripe_customer(&identity.user_id, &customer_id)
        .await?;
    Ok(customer_id)
}

/// Metadata a paid checkout session carries back from the provider
#[derive(Debug, Clone, Copy)]
pub struct PaidSession<'a> {
    pub enrollment_id: &'a str,
    pub user_id: Option<&'a str>,
    pub course_id: Option<&'a str>,
}

/// Confirmed payment for the enrollment named in session metadata.
///
/// If that row is gone (its checkout transaction failed to commit after the
/// session was issued), the user and course from the metadata are enrolled
/// directly.
pub async fn confirm_payment(state: &AppState, paid: &PaidSession<'_>) -> ServiceResult<bool> {
    let enrollment_id = paid.enrollment_id;
    if state.store.activate_enrollment(enrollment_id).await? {
        tracing::info!(enrollment_id, "Enrollment activated");
        return Ok(true);
    }

    let (Some(user_id), Some(course_id)) = (paid.user_id, paid.course_id) else {
        tracing::error!(
            enrollment_id,
            "Paid checkout matches no enrollment and names no user or course"
        );
        return Ok(false);
    };
    let Some(course) = state.store.find_course(course_id).await? else {
        tracing::error!(enrollment_id, user_id, course_id, "Paid checkout for a deleted course");
        return Ok(false);
    };

    let recovered = state
        .store
        .activate_for(user_id, course_id, course.price)
        .await?;
    if recovered {
        tracing::warn!(
            enrollment_id,
            user_id,
            course_id,
            "Paid checkout had no matching enrollment, enrolled by user and course"
        );
    } else {
        tracing::info!(enrollment_id, "Payment confirmation ignored, enrollment already active");
    }
    Ok(recovered)
}

/// Checkout session expired without payment
pub async fn expire_checkout(state: &AppState, enrollment_id: &str) -> ServiceResult<bool> {
    let cancelled = state.store.cancel_pending(enrollment_id).await?;
    if cancelled {
        tracing::info!(enrollment_id, "Pending enrollment cancelled");
    }
    Ok(cancelled)
}

/// Enrollments per UTC day over the last 30 days, oldest first, zero-filled
pub async fn enrollment_stats(
    state: &AppState,
    identity: &UserIdentity,
) -> ServiceResult<Vec<EnrollmentDayCount>> {
    super::require_admin(identity)?;
    let first_day = day_start_millis(now_millis()) - (STATS_DAYS - 1) * DAY_MS;
    let counts = state.store.enrollment_counts_since(first_day).await?;
    Ok(zero_fill(first_day, &counts))
}

fn zero_fill(first_day: i64, counts: &[EnrollmentDayCount]) -> Vec<EnrollmentDayCount> {
    (0..STATS_DAYS)
        .map(|i| {
            let day = first_day + i * DAY_MS;
            let count = counts
                .iter()
                .filter(|c| day_start_millis(c.day) == day)
                .map(|c| c.count)
                .sum();
            EnrollmentDayCount { day, count }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Decision, DenyReason};
    use crate::testing::{TestState, admin, learner, seed_intro_js};

    #[test]
    fn test_idempotency_keys() {
        assert_eq!(customer_idempotency_key("u1"), "customer-u1");
        assert_eq!(checkout_idempotency_key("u1", "c1", "e1"), "checkout-u1-c1-e1");
    }

    #[test]
    fn test_zero_fill() {
        let first = 1_704_067_200_000;
        let counts = vec![
            EnrollmentDayCount { day: first, count: 2 },
            EnrollmentDayCount {
                day: first + 3 * DAY_MS,
                count: 1,
            },
        ];
        let out = zero_fill(first, &counts);
        assert_eq!(out.len(), 30);
        assert_eq!(out[0].count, 2);
        assert_eq!(out[1].count, 0);
        assert_eq!(out[3].count, 1);
        assert_eq!(out[29].day, first + 29 * DAY_MS);
    }

    #[tokio::test]
    async fn test_checkout_creates_pending_and_redirects() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);

        let outcome = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        let CheckoutOutcome::Redirect {
            enrollment_id,
            checkout_url,
        } = outcome
        else {
            panic!("expected redirect");
        };
        assert!(checkout_url.starts_with("https://checkout.stripe.test/"));

        let enrollment = t
            .store
            .find_enrollment(&learner().user_id, &seed.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.id, enrollment_id);
        assert_eq!(enrollment.status, EnrollmentStatus::Pending);
        assert_eq!(enrollment.amount, 49);

        let sessions = t.payments.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].idempotency_key,
            format!("checkout-{}-{}-{enrollment_id}", learner().user_id, seed.course_id)
        );
        assert_eq!(sessions[0].metadata["enrollment_id"], enrollment_id);
        assert_eq!(sessions[0].price_id, "price_intro");
    }

    #[tokio::test]
    async fn test_double_checkout_keeps_one_pending_row() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);

        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();

        let rows = t.store.enrollments_of(&learner().user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, EnrollmentStatus::Pending);

        // Same enrollment -> same idempotency key; customer created once
        let sessions = t.payments.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].idempotency_key, sessions[1].idempotency_key);
        assert_eq!(t.payments.customers(), vec!["customer-u-learner".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_row() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);
        t.payments.fail_sessions(true);

        let err = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentProviderError);
        assert!(t.store.enrollments_of(&learner().user_id).is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_existing_row_unchanged() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);
        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        let before = t.store.enrollments_of(&learner().user_id);

        t.payments.fail_sessions(true);
        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap_err();
        assert_eq!(t.store.enrollments_of(&learner().user_id), before);
    }

    #[tokio::test]
    async fn test_customer_failure_touches_no_enrollment() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);
        t.payments.fail_customers(true);

        let err = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentProviderError);
        assert!(t.store.enrollments_of(&learner().user_id).is_empty());
        assert!(t.payments.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_denial_short_circuits() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);

        for (reason, code) in [
            (DenyReason::RateLimit, ErrorCode::RateLimited),
            (DenyReason::Bot, ErrorCode::BotDetected),
        ] {
            t.shield.set(Decision::Denied(reason));
            let err = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
                .await
                .unwrap_err();
            assert_eq!(err.code(), code);
        }
        assert!(t.store.enrollments_of(&learner().user_id).is_empty());
        assert!(t.payments.customers().is_empty());
        assert!(t.payments.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_active_enrollment_is_terminal() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);

        let outcome = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        let CheckoutOutcome::Redirect { enrollment_id, .. } = outcome else {
            panic!("expected redirect");
        };
        let user = learner();
        let paid = PaidSession {
            enrollment_id: &enrollment_id,
            user_id: Some(user.user_id.as_str()),
            course_id: Some(seed.course_id.as_str()),
        };
        assert!(confirm_payment(&t.app, &paid).await.unwrap());
        assert!(!confirm_payment(&t.app, &paid).await.unwrap());

        let again = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        assert_eq!(again, CheckoutOutcome::AlreadyEnrolled { enrollment_id });
        assert_eq!(t.payments.sessions().len(), 1);

        // Expiry of an old session cannot demote an Active enrollment
        let rows = t.store.enrollments_of(&learner().user_id);
        assert!(!expire_checkout(&t.app, &rows[0].id).await.unwrap());
        assert_eq!(
            t.store.enrollments_of(&learner().user_id)[0].status,
            EnrollmentStatus::Active
        );
    }

    #[tokio::test]
    async fn test_payment_after_failed_commit_still_enrolls() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);
        t.store.fail_commits(true);

        let err = enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(t.store.enrollments_of(&learner().user_id).is_empty());

        // The provider session was issued before the commit failed
        let sessions = t.payments.sessions();
        assert_eq!(sessions.len(), 1);
        let metadata = &sessions[0].metadata;
        t.store.fail_commits(false);

        let paid = PaidSession {
            enrollment_id: metadata["enrollment_id"].as_str(),
            user_id: Some(metadata["user_id"].as_str()),
            course_id: Some(metadata["course_id"].as_str()),
        };
        assert!(confirm_payment(&t.app, &paid).await.unwrap());

        let rows = t.store.enrollments_of(&learner().user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, seed.course_id);
        assert_eq!(rows[0].status, EnrollmentStatus::Active);
        assert_eq!(rows[0].amount, 49);
    }

    #[tokio::test]
    async fn test_unknown_paid_session_without_metadata_is_ignored() {
        let t = TestState::new();
        let paid = PaidSession {
            enrollment_id: "e-missing",
            user_id: None,
            course_id: None,
        };
        assert!(!confirm_payment(&t.app, &paid).await.unwrap());
        assert!(t.store.enrollments_of(&learner().user_id).is_empty());
    }

    #[tokio::test]
    async fn test_expired_then_retried_checkout_reuses_row() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);

        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        let first = t.store.enrollments_of(&learner().user_id)[0].clone();
        assert!(expire_checkout(&t.app, &first.id).await.unwrap());
        assert_eq!(
            t.store.enrollments_of(&learner().user_id)[0].status,
            EnrollmentStatus::Cancelled
        );

        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();
        let rows = t.store.enrollments_of(&learner().user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].status, EnrollmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_unpublished_course_not_purchasable() {
        let t = TestState::new();
        let course_id = t.store.seed_course("draft-only");
        t.store.set_course_status(&course_id, CourseStatus::Draft);

        let err = enroll_in_course(&t.app, &learner(), &t.client, &course_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CourseNotPurchasable);
    }

    #[tokio::test]
    async fn test_stats_cover_thirty_days() {
        let t = TestState::new();
        let seed = seed_intro_js(&t.store);
        enroll_in_course(&t.app, &learner(), &t.client, &seed.course_id)
            .await
            .unwrap();

        let stats = enrollment_stats(&t.app, &admin()).await.unwrap();
        assert_eq!(stats.len(), 30);
        assert_eq!(stats[29].day, day_start_millis(now_millis()));
        assert_eq!(stats.iter().map(|d| d.count).sum::<i64>(), 1);
        assert_eq!(stats[29].count, 1);
    }
}
