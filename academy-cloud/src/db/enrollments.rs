use async_trait::async_trait;
use shared::models::{Course, Enrollment, EnrollmentDayCount};
use shared::util::{new_id, now_millis};
use sqlx::{Postgres, Transaction};

use super::PgStore;
use crate::error::ServiceResult;
use crate::services::enrollment::{EnrollmentStore, PendingCheckout};

const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, status, amount, created_at, updated_at";

/// Open transaction holding the enrollment row lock
struct PgPendingCheckout {
    tx: Transaction<'static, Postgres>,
    enrollment: Enrollment,
}

#[async_trait]
impl PendingCheckout for PgPendingCheckout {
    fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ServiceResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> ServiceResult<Option<Enrollment>> {
        let enrollment = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 AND course_id = $2"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn begin_checkout(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<Box<dyn PendingCheckout>> {
        let mut tx = self.pool.begin().await?;

        // The upsert takes the row lock; an Active row comes back unchanged
        let enrollment: Enrollment = sqlx::query_as(&format!(
            "INSERT INTO enrollments (id, user_id, course_id, status, amount, created_at, updated_at)
             VALUES ($1, $2, $3, 'pending', $4, $5, $5)
             ON CONFLICT (user_id, course_id) DO UPDATE SET
                status = CASE WHEN enrollments.status = 'active'
                    THEN enrollments.status ELSE 'pending'::enrollment_status END,
                amount = CASE WHEN enrollments.status = 'active'
                    THEN enrollments.amount ELSE EXCLUDED.amount END,
                updated_at = CASE WHEN enrollments.status = 'active'
                    THEN enrollments.updated_at ELSE EXCLUDED.updated_at END
             RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(new_id())
        .bind(user_id)
        .bind(course_id)
        .bind(amount)
        .bind(now_millis())
        .fetch_one(&mut *tx)
        .await?;

        Ok(Box::new(PgPendingCheckout { tx, enrollment }))
    }

    async fn activate_enrollment(&self, enrollment_id: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE enrollments SET status = 'active', updated_at = $2
             WHERE id = $1 AND status <> 'active'",
        )
        .bind(enrollment_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn activate_for(
        &self,
        user_id: &str,
        course_id: &str,
        amount: i64,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            "INSERT INTO enrollments (id, user_id, course_id, status, amount, created_at, updated_at)
             VALUES ($1, $2, $3, 'active', $4, $5, $5)
             ON CONFLICT (user_id, course_id) DO UPDATE SET
                status = 'active', updated_at = EXCLUDED.updated_at
             WHERE enrollments.status <> 'active'",
        )
        .bind(new_id())
        .bind(user_id)
        .bind(course_id)
        .bind(amount)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_pending(&self, enrollment_id: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE enrollments SET status = 'cancelled', updated_at = $2
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(enrollment_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_courses(&self, user_id: &str) -> ServiceResult<Vec<Course>> {
        let courses = sqlx::query_as(
            "SELECT c.id, c.title, c.slug, c.description, c.small_description, c.file_key,
                c.price, c.duration, c.level, c.category, c.status, c.stripe_price_id,
                c.user_id, c.created_at, c.updated_at
             FROM enrollments e JOIN courses c ON c.id = e.course_id
             WHERE e.user_id = $1 AND e.status = 'active'
             ORDER BY e.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn enrollment_counts_since(&self, since: i64) -> ServiceResult<Vec<EnrollmentDayCount>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT created_at - MOD(created_at, 86400000) AS day, COUNT(*) AS count
             FROM enrollments
             WHERE created_at >= $1
             GROUP BY day
             ORDER BY day",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(day, count)| EnrollmentDayCount { day, count })
            .collect())
    }
}
