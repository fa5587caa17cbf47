//! Business operations
//!
//! Each operation receives the caller's identity explicitly and talks to
//! persistence and external providers only through the traits held in
//! [`AppState`](crate::state::AppState).

pub mod assets;
pub mod catalog;
pub mod enrollment;
pub mod ledger;
pub mod progress;
pub mod reorder;
pub mod structure;
pub mod uploads;

use shared::error::AppError;

use crate::auth::UserIdentity;

pub(crate) fn require_admin(identity: &UserIdentity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::admin_required())
    }
}
