use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::{Course, CourseInput, CourseStatus};
use shared::util::now_millis;

use super::{COURSE_COLUMNS, PgStore, is_unique_violation, lesson_keys};
use crate::error::{ServiceError, ServiceResult};
use crate::services::catalog::CourseStore;

const SLUG_CONSTRAINT: &str = "courses_slug_key";

fn slug_conflict(e: sqlx::Error) -> ServiceError {
    if is_unique_violation(&e, SLUG_CONSTRAINT) {
        AppError::new(ErrorCode::CourseSlugExists).into()
    } else {
        e.into()
    }
}

#[async_trait]
impl CourseStore for PgStore {
    async fn insert_course(&self, course: &Course) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO courses (id, title, slug, description, small_description, file_key,
                price, duration, level, category, status, stripe_price_id, user_id,
                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&course.id)
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(&course.small_description)
        .bind(&course.file_key)
        .bind(course.price)
        .bind(course.duration)
        .bind(course.level)
        .bind(&course.category)
        .bind(course.status)
        .bind(&course.stripe_price_id)
        .bind(&course.user_id)
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.pool)
        .await
        .map_err(slug_conflict)?;
        Ok(())
    }

    async fn update_course(
        &self,
        course_id: &str,
        input: &CourseInput,
    ) -> ServiceResult<Option<(Course, Course)>> {
        let mut tx = self.pool.begin().await?;

        let before: Option<Course> = sqlx::query_as(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 FOR UPDATE"
        ))
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(before) = before else {
            return Ok(None);
        };

        let after: Course = sqlx::query_as(&format!(
            "UPDATE courses SET
                title = $2, slug = $3, description = $4, small_description = $5,
                file_key = $6, price = $7, duration = $8, level = $9, category = $10,
                status = $11, updated_at = $12
             WHERE id = $1
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(course_id)
        .bind(input.title.trim())
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.small_description.trim())
        .bind(&input.file_key)
        .bind(input.price)
        .bind(input.duration)
        .bind(input.level)
        .bind(&input.category)
        .bind(input.status)
        .bind(now_millis())
        .fetch_one(&mut *tx)
        .await
        .map_err(slug_conflict)?;

        tx.commit().await?;
        Ok(Some((before, after)))
    }

    async fn delete_course(&self, course_id: &str) -> ServiceResult<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let cover: Option<(String,)> =
            sqlx::query_as("SELECT file_key FROM courses WHERE id = $1 FOR UPDATE")
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((cover,)) = cover else {
            return Ok(None);
        };

        let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT l.video_key, l.thumbnail_key
             FROM lessons l JOIN chapters c ON c.id = l.chapter_id
             WHERE c.course_id = $1",
        )
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;

        // Chapters, lessons, progress and enrollments cascade
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut keys = vec![cover];
        keys.extend(lesson_keys(rows));
        Ok(Some(keys))
    }

    async fn find_course(&self, course_id: &str) -> ServiceResult<Option<Course>> {
        let course = sqlx::query_as(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    async fn find_course_by_slug(&self, slug: &str) -> ServiceResult<Option<Course>> {
        let course =
            sqlx::query_as(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(course)
    }

    async fn list_courses(&self, status: Option<CourseStatus>) -> ServiceResult<Vec<Course>> {
        let courses = sqlx::query_as(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses
             WHERE $1::course_status IS NULL OR status = $1
             ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }
}
