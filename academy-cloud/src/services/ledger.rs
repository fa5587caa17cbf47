//! Position Ledger
//!
//! Every chapter of a course and every lesson of a chapter carries a 1-based
//! position. At rest the positions of a sibling group are exactly `1..=N`.
//! Writes replace the positions of a whole group at once.

use async_trait::async_trait;
use std::collections::HashSet;

use shared::error::{AppError, ErrorCode};
use shared::models::PositionAssignment;

use crate::error::ServiceResult;

/// The set of items whose positions are ordered together
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiblingGroup {
    /// Chapters of one course
    Chapters { course_id: String },
    /// Lessons of one chapter
    Lessons { chapter_id: String },
}

impl SiblingGroup {
    pub fn chapters(course_id: impl Into<String>) -> Self {
        Self::Chapters {
            course_id: course_id.into(),
        }
    }

    pub fn lessons(chapter_id: impl Into<String>) -> Self {
        Self::Lessons {
            chapter_id: chapter_id.into(),
        }
    }

    /// Owning course or chapter ID
    pub fn parent_id(&self) -> &str {
        match self {
            Self::Chapters { course_id } => course_id,
            Self::Lessons { chapter_id } => chapter_id,
        }
    }

    pub fn item_kind(&self) -> &'static str {
        match self {
            Self::Chapters { .. } => "chapter",
            Self::Lessons { .. } => "lesson",
        }
    }

    /// Error for a missing parent
    pub fn parent_not_found(&self) -> AppError {
        match self {
            Self::Chapters { course_id } => {
                AppError::new(ErrorCode::CourseNotFound).with_detail("course_id", course_id.clone())
            }
            Self::Lessons { chapter_id } => AppError::new(ErrorCode::ChapterNotFound)
                .with_detail("chapter_id", chapter_id.clone()),
        }
    }
}

/// Persistent positions of sibling groups
#[async_trait]
pub trait PositionLedger: Send + Sync {
    /// Item IDs of the group ordered by position; `parent_not_found` if the owner is missing
    async fn group_members(&self, group: &SiblingGroup) -> ServiceResult<Vec<String>>;

    /// Atomically replace every position of the group.
    ///
    /// Implementations lock the group, run [`validate_assignments`] against
    /// the locked member list and write all rows or none.
    async fn set_positions(
        &self,
        group: &SiblingGroup,
        assignments: &[PositionAssignment],
    ) -> ServiceResult<()>;
}

/// True when `positions` is a permutation of `1..=N`
pub fn is_dense(positions: impl IntoIterator<Item = i32>) -> bool {
    let mut sorted: Vec<i32> = positions.into_iter().collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(i, &p)| i64::from(p) == i as i64 + 1)
}

/// Check a full-group assignment against the current members.
///
/// Foreign items are reported before ordering problems.
pub fn validate_assignments(
    group: &SiblingGroup,
    members: &[String],
    assignments: &[PositionAssignment],
) -> Result<(), AppError> {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();

    if let Some(foreign) = assignments
        .iter()
        .find(|a| !member_set.contains(a.item_id.as_str()))
    {
        return Err(AppError::new(ErrorCode::ItemNotInGroup)
            .with_detail("item_id", foreign.item_id.clone())
            .with_detail("group_id", group.parent_id().to_string()));
    }

    let assigned: HashSet<&str> = assignments.iter().map(|a| a.item_id.as_str()).collect();
    if assigned.len() != assignments.len() {
        return Err(AppError::with_message(
            ErrorCode::PositionsNotDense,
            format!("Each {} may appear only once", group.item_kind()),
        ));
    }
    if assigned.len() != member_set.len() {
        return Err(AppError::with_message(
            ErrorCode::PositionsNotDense,
            format!("Every {} of the group must be assigned a position", group.item_kind()),
        )
        .with_detail("expected", members.len())
        .with_detail("received", assignments.len()));
    }

    if !is_dense(assignments.iter().map(|a| a.position)) {
        return Err(AppError::new(ErrorCode::PositionsNotDense));
    }
    Ok(())
}

/// Assign `1..=N` following the given order
pub fn renumber<S: AsRef<str>>(ordered_ids: &[S]) -> Vec<PositionAssignment> {
    ordered_ids
        .iter()
        .enumerate()
        .map(|(i, id)| PositionAssignment::new(id.as_ref(), i as i32 + 1))
        .collect()
}

/// Positions of the remaining siblings once `removed` leaves the group
pub fn renumber_without<S: AsRef<str>>(ordered_ids: &[S], removed: &str) -> Vec<PositionAssignment> {
    let remaining: Vec<&str> = ordered_ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| *id != removed)
        .collect();
    renumber(&remaining)
}
