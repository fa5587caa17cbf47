//! Persistence seam
//!
//! `Store` bundles every repository trait the services use. `PgStore`
//! implements it for production; tests run the same services against an
//! in-memory implementation.

use crate::auth::UserStore;
use crate::services::catalog::CourseStore;
use crate::services::enrollment::{EnrollmentStore, WebhookEvents};
use crate::services::ledger::PositionLedger;
use crate::services::progress::ProgressStore;
use crate::services::structure::StructureStore;

pub trait Store:
    CourseStore
    + StructureStore
    + PositionLedger
    + EnrollmentStore
    + ProgressStore
    + UserStore
    + WebhookEvents
{
}

impl<T> Store for T where
    T: CourseStore
        + StructureStore
        + PositionLedger
        + EnrollmentStore
        + ProgressStore
        + UserStore
        + WebhookEvents
{
}
