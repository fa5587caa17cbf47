//! Database access layer
//!
//! `PgStore` implements every repository trait of the service layer.
//! Multi-statement writes run in one transaction; sibling-group writes lock
//! the parent row first so appends, deletes and reorders of one group
//! serialize.

pub mod courses;
pub mod enrollments;
pub mod positions;
pub mod progress;
pub mod structure;
pub mod users;
pub mod webhook_events;

use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const COURSE_COLUMNS: &str = "id, title, slug, description, small_description, \
     file_key, price, duration, level, category, status, stripe_price_id, user_id, \
     created_at, updated_at";

pub(crate) const CHAPTER_COLUMNS: &str = "id, course_id, title, position, created_at, updated_at";

pub(crate) const LESSON_COLUMNS: &str = "id, chapter_id, title, description, position, \
     video_key, thumbnail_key, created_at, updated_at";

/// True if `e` is a unique violation of the named constraint
pub(crate) fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Flatten `(video_key, thumbnail_key)` rows into the keys they hold
pub(crate) fn lesson_keys(rows: Vec<(Option<String>, Option<String>)>) -> Vec<String> {
    rows.into_iter()
        .flat_map(|(video, thumb)| video.into_iter().chain(thumb))
        .collect()
}
