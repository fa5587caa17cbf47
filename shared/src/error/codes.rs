//! Unified error codes for Academy
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission and request-shield errors
//! - 3xxx: Course structure errors
//! - 4xxx: Enrollment and progress errors
//! - 5xxx: Payment errors
//! - 6xxx: Upload and storage errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a bare u16 so clients can switch on the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 6,
    /// Value out of range
    ValueOutOfRange = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1002,
    /// Token is invalid
    TokenInvalid = 1003,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,
    /// Too many requests from this client
    RateLimited = 2101,
    /// Request looks automated
    BotDetected = 2102,

    // ==================== 3xxx: Course structure ====================
    /// Course not found
    CourseNotFound = 3001,
    /// Chapter not found
    ChapterNotFound = 3002,
    /// Lesson not found
    LessonNotFound = 3003,
    /// Course slug already taken
    CourseSlugExists = 3004,
    /// Item does not belong to the sibling group
    ItemNotInGroup = 3101,
    /// Positions are not a dense 1..N permutation
    PositionsNotDense = 3102,
    /// Lessons cannot move between chapters
    CrossGroupMove = 3103,
    /// Target index outside the sibling group
    TargetIndexOutOfRange = 3104,

    // ==================== 4xxx: Enrollment ====================
    /// Enrollment not found
    EnrollmentNotFound = 4001,
    /// User is not enrolled in the course
    NotEnrolled = 4002,
    /// Course is not open for enrollment
    CourseNotPurchasable = 4003,

    // ==================== 5xxx: Payment ====================
    /// Payment provider call failed
    PaymentProviderError = 5001,
    /// Webhook signature rejected
    WebhookSignatureInvalid = 5002,
    /// Webhook payload could not be parsed
    WebhookPayloadInvalid = 5003,

    // ==================== 6xxx: Upload / storage ====================
    /// File too large
    FileTooLarge = 6001,
    /// Unsupported file format
    UnsupportedFileFormat = 6002,
    /// Empty file
    EmptyFile = 6003,
    /// No filename provided
    NoFilename = 6004,
    /// Object storage call failed
    StorageError = 6101,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the user-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Admin role required",
            ErrorCode::RateLimited => {
                "You have been blocked for sending too many requests. Please try again later."
            }
            ErrorCode::BotDetected => {
                "You have been blocked as an automated client. If this is a mistake, please contact support."
            }

            // Course structure
            ErrorCode::CourseNotFound => "Course not found",
            ErrorCode::ChapterNotFound => "Chapter not found",
            ErrorCode::LessonNotFound => "Lesson not found",
            ErrorCode::CourseSlugExists => "Course slug already exists",
            ErrorCode::ItemNotInGroup => "Item does not belong to this group",
            ErrorCode::PositionsNotDense => "Positions must be a contiguous sequence starting at 1",
            ErrorCode::CrossGroupMove => "Lessons cannot be moved between chapters",
            ErrorCode::TargetIndexOutOfRange => "Target position is out of range",

            // Enrollment
            ErrorCode::EnrollmentNotFound => "Enrollment not found",
            ErrorCode::NotEnrolled => "You are not enrolled in this course",
            ErrorCode::CourseNotPurchasable => "Course is not available for purchase",

            // Payment
            ErrorCode::PaymentProviderError => "Failed to start checkout. Please try again.",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature verification failed",
            ErrorCode::WebhookPayloadInvalid => "Invalid webhook payload",

            // Upload / storage
            ErrorCode::FileTooLarge => "File is too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::EmptyFile => "File is empty",
            ErrorCode::NoFilename => "No filename provided",
            ErrorCode::StorageError => "Storage operation failed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Something went wrong. Please try again.",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::RequiredField),
            7 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::TokenExpired),
            1003 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::AdminRequired),
            2101 => Ok(ErrorCode::RateLimited),
            2102 => Ok(ErrorCode::BotDetected),

            // Course structure
            3001 => Ok(ErrorCode::CourseNotFound),
            3002 => Ok(ErrorCode::ChapterNotFound),
            3003 => Ok(ErrorCode::LessonNotFound),
            3004 => Ok(ErrorCode::CourseSlugExists),
            3101 => Ok(ErrorCode::ItemNotInGroup),
            3102 => Ok(ErrorCode::PositionsNotDense),
            3103 => Ok(ErrorCode::CrossGroupMove),
            3104 => Ok(ErrorCode::TargetIndexOutOfRange),

            // Enrollment
            4001 => Ok(ErrorCode::EnrollmentNotFound),
            4002 => Ok(ErrorCode::NotEnrolled),
            4003 => Ok(ErrorCode::CourseNotPurchasable),

            // Payment
            5001 => Ok(ErrorCode::PaymentProviderError),
            5002 => Ok(ErrorCode::WebhookSignatureInvalid),
            5003 => Ok(ErrorCode::WebhookPayloadInvalid),

            // Upload / storage
            6001 => Ok(ErrorCode::FileTooLarge),
            6002 => Ok(ErrorCode::UnsupportedFileFormat),
            6003 => Ok(ErrorCode::EmptyFile),
            6004 => Ok(ErrorCode::NoFilename),
            6101 => Ok(ErrorCode::StorageError),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}
