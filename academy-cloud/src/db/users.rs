use async_trait::async_trait;
use shared::models::User;
use shared::util::now_millis;

use super::PgStore;
use crate::auth::{UserIdentity, UserStore};
use crate::error::ServiceResult;

#[async_trait]
impl UserStore for PgStore {
    async fn ensure_user(&self, identity: &UserIdentity) -> ServiceResult<User> {
        let user = sqlx::query_as(
            "INSERT INTO users (id, email, name, role, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email, name = EXCLUDED.name, role = EXCLUDED.role
             RETURNING id, email, name, role, stripe_customer_id, created_at",
        )
        .bind(&identity.user_id)
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(identity.role)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_stripe_customer(&self, user_id: &str, customer_id: &str) -> ServiceResult<()> {
        sqlx::query("UPDATE users SET stripe_customer_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
