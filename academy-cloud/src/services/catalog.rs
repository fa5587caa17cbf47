//! Course catalog and course administration

use async_trait::async_trait;

use shared::error::{AppError, ErrorCode};
use shared::models::{Course, CourseDetail, CourseInput, CourseStatus};

use super::structure::StructureStore;
use crate::auth::{ClientInfo, ShieldRule, UserIdentity, UserStore};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::stripe::ProductRequest;

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// `CourseSlugExists` on a duplicate slug
    async fn insert_course(&self, course: &Course) -> ServiceResult<()>;

    /// Replace the editable fields; returns `(before, after)`, `None` if absent
    async fn update_course(
        &self,
        course_id: &str,
        input: &CourseInput,
    ) -> ServiceResult<Option<(Course, Course)>>;

    /// Delete the course with its chapters, lessons, enrollments and progress.
    ///
    /// Returns every asset key the course tree referenced, `None` if absent.
    async fn delete_course(&self, course_id: &str) -> ServiceResult<Option<Vec<String>>>;

    async fn find_course(&self, course_id: &str) -> ServiceResult<Option<Course>>;

    async fn find_course_by_slug(&self, slug: &str) -> ServiceResult<Option<Course>>;

    /// Newest first
    async fn list_courses(&self, status: Option<CourseStatus>) -> ServiceResult<Vec<Course>>;
}

pub fn course_not_found(course_id: &str) -> AppError {
    AppError::new(ErrorCode::CourseNotFound).with_detail("course_id", course_id.to_string())
}

/// Existing course or `CourseNotFound`
pub async fn require_course<S: CourseStore + ?Sized>(
    store: &S,
    course_id: &str,
) -> ServiceResult<Course> {
    store
        .find_course(course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id).into())
}

// ── Public ──

pub async fn list_published(state: &AppState) -> ServiceResult<Vec<Course>> {
    state.store.list_courses(Some(CourseStatus::Published)).await
}

/// Published course by slug with its ordered outline
pub async fn course_detail(state: &AppState, slug: &str) -> ServiceResult<CourseDetail> {
    let course = state
        .store
        .find_course_by_slug(slug)
        .await?
        .filter(|c| c.status == CourseStatus::Published)
        .ok_or_else(|| AppError::new(ErrorCode::CourseNotFound).with_detail("slug", slug.to_string()))?;
    let chapters = state.store.course_outline(&course.id).await?;
    Ok(CourseDetail { course, chapters })
}

// ── Admin ──

pub async fn admin_list(state: &AppState, identity: &UserIdentity) -> ServiceResult<Vec<Course>> {
    super::require_admin(identity)?;
    state.store.list_courses(None).await
}

/// Any course with its outline, for the editor
pub async fn admin_course(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
) -> ServiceResult<CourseDetail> {
    super::require_admin(identity)?;
    let course = require_course(&*state.store, course_id).await?;
    let chapters = state.store.course_outline(course_id).await?;
    Ok(CourseDetail { course, chapters })
}

pub async fn create_course(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    input: &CourseInput,
) -> ServiceResult<Course> {
    super::require_admin(identity)?;
    state
        .shield
        .protect(ShieldRule::ADMIN_WRITE, &identity.user_id, client)
        .await
        .into_result()?;
    input.validate()?;

    if state.store.find_course_by_slug(&input.slug).await?.is_some() {
        return Err(AppError::new(ErrorCode::CourseSlugExists)
            .with_detail("slug", input.slug.clone())
            .into());
    }

    state.store.ensure_user(identity).await?;

    let unit_amount = input
        .price
        .checked_mul(100)
        .ok_or_else(|| AppError::validation("Price is out of range").with_detail("field", "price"))?;

    let price_id = state
        .payments
        .create_product(&ProductRequest {
            name: input.title.trim().to_string(),
            description: input.small_description.trim().to_string(),
            unit_amount,
            currency: state.stripe_currency.clone(),
            image_url: Some(state.objects.public_url(&input.file_key)),
        })
        .await
        .map_err(ServiceError::payment)?;

    let now = shared::util::now_millis();
    let course = Course {
        id: shared::util::new_id(),
        title: input.title.trim().to_string(),
        slug: input.slug.clone(),
        description: input.description.clone(),
        small_description: input.small_description.trim().to_string(),
        file_key: input.file_key.clone(),
        price: input.price,
        duration: input.duration,
        level: input.level,
        category: input.category.clone(),
        status: input.status,
        stripe_price_id: Some(price_id.clone()),
        user_id: identity.user_id.clone(),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.store.insert_course(&course).await {
        if let Err(archive_err) = state.payments.archive_product(&price_id).await {
            tracing::warn!(price_id = %price_id, error = %archive_err, "Failed to archive product of unsaved course");
        }
        return Err(e);
    }

    tracing::info!(course_id = %course.id, slug = %course.slug, "Course created");
    Ok(course)
}

pub async fn update_course(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    course_id: &str,
    input: &CourseInput,
) -> ServiceResult<Course> {
    super::require_admin(identity)?;
    state
        .shield
        .protect(ShieldRule::ADMIN_WRITE, &identity.user_id, client)
        .await
        .into_result()?;
    input.validate()?;

    let (before, after) = state
        .store
        .update_course(course_id, input)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    tracing::info!(course_id, "Course updated");

    state
        .janitor
        .reconcile(&[before.file_key], &[after.file_key.clone()])
        .await;
    Ok(after)
}

pub async fn delete_course(
    state: &AppState,
    identity: &UserIdentity,
    client: &ClientInfo,
    course_id: &str,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    state
        .shield
        .protect(ShieldRule::ADMIN_WRITE, &identity.user_id, client)
        .await
        .into_result()?;

    let course = require_course(&*state.store, course_id).await?;
    if let Some(price_id) = &course.stripe_price_id {
        state
            .payments
            .archive_product(price_id)
            .await
            .map_err(ServiceError::payment)?;
    }

    let released = state
        .store
        .delete_course(course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    tracing::info!(course_id, keys = released.len(), "Course deleted");

    state.janitor.reconcile(&released, &[]).await;
    Ok(())
}
