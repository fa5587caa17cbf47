//! Enrollment Model

use serde::{Deserialize, Serialize};

/// Enrollment lifecycle: Pending -> Active, Pending -> Cancelled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "enrollment_status", rename_all = "lowercase")
)]
pub enum EnrollmentStatus {
    /// Checkout started, payment not confirmed
    Pending,
    /// Payment confirmed
    Active,
    /// Checkout abandoned or expired
    Cancelled,
}

impl EnrollmentStatus {
    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    /// Active is terminal; any other state may restart checkout
    pub fn can_checkout(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Enrollment entity, unique per (user, course)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    /// Course price at the time of the latest checkout attempt
    pub amount: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of an enroll-in-course request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Redirect the learner to the hosted payment page
    Redirect {
        enrollment_id: String,
        checkout_url: String,
    },
    /// Enrollment already active, nothing to pay
    AlreadyEnrolled { enrollment_id: String },
}

/// Enrollments started on one UTC day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrollmentDayCount {
    /// UTC midnight of the day, in milliseconds
    pub day: i64,
    pub count: i64,
}
