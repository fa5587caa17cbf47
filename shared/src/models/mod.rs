//! Data models
//!
//! Shared between academy-cloud and its clients (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are UUID strings; timestamps are UTC milliseconds.

pub mod course;
pub mod enrollment;
pub mod progress;
pub mod structure;
pub mod upload;
pub mod user;

// Re-exports
pub use course::*;
pub use enrollment::*;
pub use progress::*;
pub use structure::*;
pub use upload::*;
pub use user::*;
