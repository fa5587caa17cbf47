use async_trait::async_trait;
use shared::models::LessonProgress;
use shared::util::{new_id, now_millis};

use super::PgStore;
use crate::error::ServiceResult;
use crate::services::progress::ProgressStore;

const PROGRESS_COLUMNS: &str = "id, user_id, lesson_id, completed, created_at, updated_at";

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> ServiceResult<Option<LessonProgress>> {
        let row = sqlx::query_as(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2"
        ))
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> ServiceResult<LessonProgress> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO lesson_progress (id, user_id, lesson_id, completed, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             ON CONFLICT (user_id, lesson_id) DO UPDATE SET
                completed = EXCLUDED.completed, updated_at = EXCLUDED.updated_at
             RETURNING {PROGRESS_COLUMNS}"
        ))
        .bind(new_id())
        .bind(user_id)
        .bind(lesson_id)
        .bind(completed)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn count_course_progress(
        &self,
        course_id: &str,
        user_id: &str,
    ) -> ServiceResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(l.id), COUNT(p.id) FILTER (WHERE p.completed)
             FROM lessons l
             JOIN chapters c ON c.id = l.chapter_id
             LEFT JOIN lesson_progress p ON p.lesson_id = l.id AND p.user_id = $2
             WHERE c.course_id = $1",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}
