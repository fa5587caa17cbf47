//! Structure Reorder Engine
//!
//! A drag-and-drop move is remove-and-reinsert on an ordered list of IDs,
//! followed by a 1..N renumber. The list is updated optimistically and
//! restored from a snapshot when persistence fails.

use shared::error::{AppError, ErrorCode};
use shared::models::{MoveItemRequest, PositionAssignment, ReorderRequest};

use super::ledger::{PositionLedger, SiblingGroup, renumber};
use super::structure::scoped_chapter;
use crate::auth::UserIdentity;
use crate::error::ServiceResult;
use crate::state::AppState;

/// Remove `item_id` and reinsert it at `target_index` (0-based, in the resulting list)
pub fn move_item(
    items: &[String],
    item_id: &str,
    target_index: usize,
) -> Result<Vec<String>, AppError> {
    let from = items.iter().position(|id| id == item_id).ok_or_else(|| {
        AppError::new(ErrorCode::ItemNotInGroup).with_detail("item_id", item_id.to_string())
    })?;
    if target_index >= items.len() {
        return Err(AppError::new(ErrorCode::TargetIndexOutOfRange)
            .with_detail("target_index", target_index)
            .with_detail("len", items.len()));
    }

    let mut next = items.to_vec();
    let moved = next.remove(from);
    next.insert(target_index, moved);
    Ok(next)
}

/// Client-side ordered view of one sibling group
#[derive(Debug, Clone)]
pub struct OptimisticOrder {
    group: SiblingGroup,
    items: Vec<String>,
}

impl OptimisticOrder {
    pub fn new(group: SiblingGroup, items: Vec<String>) -> Self {
        Self { group, items }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn assignments(&self) -> Vec<PositionAssignment> {
        renumber(&self.items)
    }

    /// Apply the move locally, then persist the whole group.
    ///
    /// On any error the prior order is restored before returning.
    pub async fn apply_move<L: PositionLedger + ?Sized>(
        &mut self,
        ledger: &L,
        item_id: &str,
        target_index: usize,
    ) -> ServiceResult<()> {
        let snapshot = self.items.clone();
        self.items = move_item(&self.items, item_id, target_index)?;

        if let Err(e) = ledger.set_positions(&self.group, &self.assignments()).await {
            tracing::warn!(
                group_id = %self.group.parent_id(),
                item_id,
                error = %e,
                "Reorder not persisted, restoring previous order"
            );
            self.items = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

/// Move one item within its group and persist the new order
pub async fn move_within_group<L: PositionLedger + ?Sized>(
    ledger: &L,
    group: SiblingGroup,
    req: &MoveItemRequest,
) -> ServiceResult<Vec<PositionAssignment>> {
    if let Some(target) = req.target_group_id.as_deref()
        && target != group.parent_id()
    {
        let message = match group {
            SiblingGroup::Lessons { .. } => "Lessons cannot be moved between chapters",
            SiblingGroup::Chapters { .. } => "Chapters cannot be moved between courses",
        };
        return Err(AppError::with_message(ErrorCode::CrossGroupMove, message)
            .with_detail("item_id", req.item_id.clone())
            .into());
    }

    let members = ledger.group_members(&group).await?;
    let mut order = OptimisticOrder::new(group, members);
    order
        .apply_move(ledger, &req.item_id, req.target_index)
        .await?;

    tracing::info!(
        group_id = %order.group.parent_id(),
        item_id = %req.item_id,
        target_index = req.target_index,
        "Reorder persisted"
    );
    Ok(order.assignments())
}

/// Persist a full ordering produced by the client
pub async fn reorder_group<L: PositionLedger + ?Sized>(
    ledger: &L,
    group: SiblingGroup,
    req: &ReorderRequest,
) -> ServiceResult<()> {
    ledger.set_positions(&group, &req.items).await?;
    tracing::info!(
        group_id = %group.parent_id(),
        kind = group.item_kind(),
        count = req.items.len(),
        "Reorder persisted"
    );
    Ok(())
}

// ── Admin operations ──

pub async fn reorder_chapters(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    req: &ReorderRequest,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    reorder_group(&*state.store, SiblingGroup::chapters(course_id), req).await
}

pub async fn move_chapter(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    req: &MoveItemRequest,
) -> ServiceResult<Vec<PositionAssignment>> {
    super::require_admin(identity)?;
    move_within_group(&*state.store, SiblingGroup::chapters(course_id), req).await
}

pub async fn reorder_lessons(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    req: &ReorderRequest,
) -> ServiceResult<()> {
    super::require_admin(identity)?;
    scoped_chapter(&*state.store, course_id, chapter_id).await?;
    reorder_group(&*state.store, SiblingGroup::lessons(chapter_id), req).await
}

pub async fn move_lesson(
    state: &AppState,
    identity: &UserIdentity,
    course_id: &str,
    chapter_id: &str,
    req: &MoveItemRequest,
) -> ServiceResult<Vec<PositionAssignment>> {
    super::require_admin(identity)?;
    scoped_chapter(&*state.store, course_id, chapter_id).await?;
    move_within_group(&*state.store, SiblingGroup::lessons(chapter_id), req).await
}
