//! Course structure models (chapters, lessons, positions)

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Chapter entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Chapter {
    pub id: String,
    pub course_id: String,
    pub title: String,
    /// 1-based, dense within the course
    pub position: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Lesson entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Lesson {
    pub id: String,
    pub chapter_id: String,
    pub title: String,
    pub description: Option<String>,
    /// 1-based, dense within the chapter
    pub position: i32,
    pub video_key: Option<String>,
    pub thumbnail_key: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Lesson {
    /// Object-storage keys this lesson references
    pub fn asset_keys(&self) -> Vec<String> {
        self.video_key
            .iter()
            .chain(self.thumbnail_key.iter())
            .cloned()
            .collect()
    }
}

/// Chapter with its ordered lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutline {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub lessons: Vec<Lesson>,
}

/// Create/rename chapter payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterInput {
    pub title: String,
}

impl ChapterInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)
    }
}

/// Create/update lesson payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_key: Option<String>,
    #[serde(default)]
    pub thumbnail_key: Option<String>,
}

impl LessonInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if !(3..=100).contains(&len) {
        return Err(AppError::validation("Title must be between 3 and 100 characters")
            .with_detail("field", "title"));
    }
    Ok(())
}

/// One `{item_id, position}` pair of a reorder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionAssignment {
    pub item_id: String,
    pub position: i32,
}

impl PositionAssignment {
    pub fn new(item_id: impl Into<String>, position: i32) -> Self {
        Self {
            item_id: item_id.into(),
            position,
        }
    }
}

/// Full ordering of a sibling group, as produced by a drag-and-drop client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub items: Vec<PositionAssignment>,
}

/// Single drag-and-drop move within a sibling group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveItemRequest {
    pub item_id: String,
    /// 0-based index in the group after the move
    pub target_index: usize,
    /// Group the item was dropped into; defaults to its own group
    #[serde(default)]
    pub target_group_id: Option<String>,
}
