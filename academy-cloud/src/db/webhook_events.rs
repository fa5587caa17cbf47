use async_trait::async_trait;
use shared::util::now_millis;

use super::PgStore;
use crate::error::ServiceResult;
use crate::services::enrollment::WebhookEvents;

#[async_trait]
impl WebhookEvents for PgStore {
    async fn mark_event(&self, event_id: &str, event_type: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn forget_event(&self, event_id: &str) -> ServiceResult<()> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
