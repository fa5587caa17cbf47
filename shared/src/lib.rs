//! Shared types for Academy
//!
//! Domain models, request payloads and the unified error/response
//! envelope used by the cloud service and its clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
