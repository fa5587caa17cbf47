//! Course Model

use serde::{Deserialize, Serialize};

use super::structure::ChapterOutline;
use crate::error::AppError;

/// Publication state of a course
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "course_status", rename_all = "lowercase")
)]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

/// Difficulty level of a course
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "course_level", rename_all = "lowercase")
)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Highest course price in whole currency units (Stripe caps amounts at 99,999,999 minor units)
pub const MAX_COURSE_PRICE: i64 = 999_999;

/// Categories a course can be filed under
pub const COURSE_CATEGORIES: &[&str] = &[
    "Development",
    "Business",
    "Finance",
    "IT & Software",
    "Office Productivity",
    "Personal Development",
    "Design",
    "Marketing",
    "Music",
];

/// Course entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Course {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub small_description: String,
    /// Object-storage key of the cover image
    pub file_key: String,
    /// Price in whole currency units
    pub price: i64,
    /// Duration in hours
    pub duration: i32,
    pub level: CourseLevel,
    pub category: String,
    pub status: CourseStatus,
    /// Payment-provider price backing checkout
    pub stripe_price_id: Option<String>,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create/update course payload
///
/// Edits replace every field, so one payload serves both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub small_description: String,
    pub file_key: String,
    pub price: i64,
    pub duration: i32,
    pub level: CourseLevel,
    pub category: String,
    pub status: CourseStatus,
}

impl CourseInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let title_len = self.title.trim().chars().count();
        if !(3..=100).contains(&title_len) {
            return Err(field_error("title", "Title must be between 3 and 100 characters"));
        }
        if self.description.trim().chars().count() < 3 {
            return Err(field_error(
                "description",
                "Description must be at least 3 characters",
            ));
        }
        let small_len = self.small_description.trim().chars().count();
        if !(3..=200).contains(&small_len) {
            return Err(field_error(
                "small_description",
                "Short description must be between 3 and 200 characters",
            ));
        }
        if self.file_key.trim().is_empty() {
            return Err(field_error("file_key", "A cover file is required"));
        }
        if !(1..=MAX_COURSE_PRICE).contains(&self.price) {
            return Err(field_error(
                "price",
                "Price must be between 1 and 999999",
            ));
        }
        if !(1..=500).contains(&self.duration) {
            return Err(field_error(
                "duration",
                "Duration must be between 1 and 500 hours",
            ));
        }
        if !COURSE_CATEGORIES.contains(&self.category.as_str()) {
            return Err(field_error("category", "Unknown course category"));
        }
        if !is_valid_slug(&self.slug) {
            return Err(field_error(
                "slug",
                "Slug must be at least 3 characters of lowercase letters, digits and hyphens",
            ));
        }
        Ok(())
    }
}

fn field_error(field: &str, msg: &str) -> AppError {
    AppError::validation(msg).with_detail("field", field)
}

/// URL-safe slug: lowercase ASCII letters, digits and single inner hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() >= 3
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive a slug from a title
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Course with its ordered chapter/lesson outline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub chapters: Vec<ChapterOutline>,
}
