use async_trait::async_trait;
use shared::models::PositionAssignment;
use shared::util::now_millis;
use sqlx::{Postgres, Transaction};

use super::PgStore;
use super::structure::{lock_chapter, lock_course};
use crate::error::ServiceResult;
use crate::services::ledger::{PositionLedger, SiblingGroup, validate_assignments};

fn members_sql(group: &SiblingGroup) -> &'static str {
    match group {
        SiblingGroup::Chapters { .. } => {
            "SELECT id FROM chapters WHERE course_id = $1 ORDER BY position"
        }
        SiblingGroup::Lessons { .. } => {
            "SELECT id FROM lessons WHERE chapter_id = $1 ORDER BY position"
        }
    }
}

fn update_sql(group: &SiblingGroup) -> &'static str {
    match group {
        SiblingGroup::Chapters { .. } => {
            "UPDATE chapters AS t SET position = u.position, updated_at = $3
             FROM UNNEST($1::text[], $2::integer[]) AS u(id, position)
             WHERE t.id = u.id"
        }
        SiblingGroup::Lessons { .. } => {
            "UPDATE lessons AS t SET position = u.position, updated_at = $3
             FROM UNNEST($1::text[], $2::integer[]) AS u(id, position)
             WHERE t.id = u.id"
        }
    }
}

async fn lock_parent(
    tx: &mut Transaction<'static, Postgres>,
    group: &SiblingGroup,
) -> ServiceResult<bool> {
    match group {
        SiblingGroup::Chapters { course_id } => lock_course(tx, course_id).await,
        SiblingGroup::Lessons { chapter_id } => lock_chapter(tx, chapter_id).await,
    }
}

#[async_trait]
impl PositionLedger for PgStore {
    async fn group_members(&self, group: &SiblingGroup) -> ServiceResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        if !lock_parent(&mut tx, group).await? {
            return Err(group.parent_not_found().into());
        }
        let rows: Vec<(String,)> = sqlx::query_as(members_sql(group))
            .bind(group.parent_id())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_positions(
        &self,
        group: &SiblingGroup,
        assignments: &[PositionAssignment],
    ) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        if !lock_parent(&mut tx, group).await? {
            return Err(group.parent_not_found().into());
        }

        // Validate against the membership as of the lock, not as of the request
        let rows: Vec<(String,)> = sqlx::query_as(members_sql(group))
            .bind(group.parent_id())
            .fetch_all(&mut *tx)
            .await?;
        let members: Vec<String> = rows.into_iter().map(|(id,)| id).collect();
        validate_assignments(group, &members, assignments)?;

        let (ids, positions): (Vec<String>, Vec<i32>) = assignments
            .iter()
            .map(|a| (a.item_id.clone(), a.position))
            .unzip();

        sqlx::query(update_sql(group))
            .bind(&ids)
            .bind(&positions)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;

        // Deferred (parent, position) uniqueness is checked here
        tx.commit().await?;

        tracing::debug!(
            parent_id = group.parent_id(),
            kind = group.item_kind(),
            count = assignments.len(),
            "Positions persisted"
        );
        Ok(())
    }
}
