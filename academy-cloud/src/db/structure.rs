use async_trait::async_trait;
use shared::models::{Chapter, ChapterInput, ChapterOutline, Lesson, LessonInput};
use shared::util::{new_id, now_millis};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

use super::{CHAPTER_COLUMNS, LESSON_COLUMNS, PgStore, lesson_keys};
use crate::error::ServiceResult;
use crate::services::ledger::SiblingGroup;
use crate::services::structure::StructureStore;

/// Lock the owning course; `false` if it does not exist
pub(crate) async fn lock_course(
    tx: &mut Transaction<'static, Postgres>,
    course_id: &str,
) -> ServiceResult<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(row.is_some())
}

/// Lock the owning chapter; `false` if it does not exist
pub(crate) async fn lock_chapter(
    tx: &mut Transaction<'static, Postgres>,
    chapter_id: &str,
) -> ServiceResult<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM chapters WHERE id = $1 FOR UPDATE")
            .bind(chapter_id)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(row.is_some())
}

#[async_trait]
impl StructureStore for PgStore {
    async fn course_outline(&self, course_id: &str) -> ServiceResult<Vec<ChapterOutline>> {
        let chapters: Vec<Chapter> = sqlx::query_as(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE course_id = $1 ORDER BY position"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let lessons: Vec<Lesson> = sqlx::query_as(
            "SELECT l.id, l.chapter_id, l.title, l.description, l.position,
                l.video_key, l.thumbnail_key, l.created_at, l.updated_at
             FROM lessons l JOIN chapters c ON c.id = l.chapter_id
             WHERE c.course_id = $1
             ORDER BY l.position",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_chapter: HashMap<String, Vec<Lesson>> = HashMap::new();
        for lesson in lessons {
            by_chapter
                .entry(lesson.chapter_id.clone())
                .or_default()
                .push(lesson);
        }

        Ok(chapters
            .into_iter()
            .map(|chapter| {
                let lessons = by_chapter.remove(&chapter.id).unwrap_or_default();
                ChapterOutline { chapter, lessons }
            })
            .collect())
    }

    async fn find_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Chapter>> {
        let chapter =
            sqlx::query_as(&format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1"))
                .bind(chapter_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(chapter)
    }

    async fn find_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>> {
        let lesson = sqlx::query_as(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lesson)
    }

    async fn create_chapter(
        &self,
        course_id: &str,
        input: &ChapterInput,
    ) -> ServiceResult<Chapter> {
        let mut tx = self.pool.begin().await?;
        if !lock_course(&mut tx, course_id).await? {
            return Err(SiblingGroup::chapters(course_id).parent_not_found().into());
        }

        let (next,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM chapters WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        let now = now_millis();
        let chapter: Chapter = sqlx::query_as(&format!(
            "INSERT INTO chapters (id, course_id, title, position, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(new_id())
        .bind(course_id)
        .bind(input.title.trim())
        .bind(next)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(chapter)
    }

    async fn rename_chapter(
        &self,
        chapter_id: &str,
        title: &str,
    ) -> ServiceResult<Option<Chapter>> {
        let chapter = sqlx::query_as(&format!(
            "UPDATE chapters SET title = $2, updated_at = $3 WHERE id = $1
             RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(chapter_id)
        .bind(title)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;
        Ok(chapter)
    }

    async fn delete_chapter(&self, chapter_id: &str) -> ServiceResult<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(String,)> =
            sqlx::query_as("SELECT course_id FROM chapters WHERE id = $1")
                .bind(chapter_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((course_id,)) = owner else {
            return Ok(None);
        };
        lock_course(&mut tx, &course_id).await?;

        let rows: Vec<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT video_key, thumbnail_key FROM lessons WHERE chapter_id = $1")
                .bind(chapter_id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE chapters c SET position = r.rn::integer, updated_at = $2
             FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY position) AS rn
                   FROM chapters WHERE course_id = $1) r
             WHERE c.id = r.id AND c.position <> r.rn",
        )
        .bind(&course_id)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(lesson_keys(rows)))
    }

    async fn create_lesson(&self, chapter_id: &str, input: &LessonInput) -> ServiceResult<Lesson> {
        let mut tx = self.pool.begin().await?;
        if !lock_chapter(&mut tx, chapter_id).await? {
            return Err(SiblingGroup::lessons(chapter_id).parent_not_found().into());
        }

        let (next,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .fetch_one(&mut *tx)
        .await?;

        let lesson: Lesson = sqlx::query_as(&format!(
            "INSERT INTO lessons (id, chapter_id, title, description, position,
                video_key, thumbnail_key, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {LESSON_COLUMNS}"
        ))
        .bind(new_id())
        .bind(chapter_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(next)
        .bind(&input.video_key)
        .bind(&input.thumbnail_key)
        .bind(now_millis())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        lesson_id: &str,
        input: &LessonInput,
    ) -> ServiceResult<Option<(Lesson, Lesson)>> {
        let mut tx = self.pool.begin().await?;

        let before: Option<Lesson> = sqlx::query_as(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1 FOR UPDATE"
        ))
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(before) = before else {
            return Ok(None);
        };

        let after: Lesson = sqlx::query_as(&format!(
            "UPDATE lessons SET title = $2, description = $3, video_key = $4,
                thumbnail_key = $5, updated_at = $6
             WHERE id = $1
             RETURNING {LESSON_COLUMNS}"
        ))
        .bind(lesson_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.video_key)
        .bind(&input.thumbnail_key)
        .bind(now_millis())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((before, after)))
    }

    async fn delete_lesson(&self, lesson_id: &str) -> ServiceResult<Option<Lesson>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(String,)> =
            sqlx::query_as("SELECT chapter_id FROM lessons WHERE id = $1")
                .bind(lesson_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((chapter_id,)) = owner else {
            return Ok(None);
        };
        lock_chapter(&mut tx, &chapter_id).await?;

        let lesson: Option<Lesson> = sqlx::query_as(&format!(
            "DELETE FROM lessons WHERE id = $1 RETURNING {LESSON_COLUMNS}"
        ))
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(lesson) = lesson else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE lessons l SET position = r.rn::integer, updated_at = $2
             FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY position) AS rn
                   FROM lessons WHERE chapter_id = $1) r
             WHERE l.id = r.id AND l.position <> r.rn",
        )
        .bind(&chapter_id)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(lesson))
    }

    async fn clear_asset_references(&self, key: &str) -> ServiceResult<u64> {
        let result = sqlx::query(
            "UPDATE lessons SET
                video_key = CASE WHEN video_key = $1 THEN NULL ELSE video_key END,
                thumbnail_key = CASE WHEN thumbnail_key = $1 THEN NULL ELSE thumbnail_key END,
                updated_at = $2
             WHERE video_key = $1 OR thumbnail_key = $1",
        )
        .bind(key)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
