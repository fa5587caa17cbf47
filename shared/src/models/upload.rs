//! Object-storage upload payloads

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode};

/// Maximum size of an image upload (5 MiB)
pub const MAX_IMAGE_BYTES: i64 = 5 * 1024 * 1024;
/// Maximum size of a video upload (5 GiB)
pub const MAX_VIDEO_BYTES: i64 = 5 * 1024 * 1024 * 1024;

/// Presigned upload request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub is_image: bool,
}

impl UploadRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.file_name.trim().is_empty() {
            return Err(AppError::new(ErrorCode::NoFilename));
        }
        if self.file_name.contains('/') || self.file_name.contains('\\') {
            return Err(AppError::validation("File name must not contain path separators")
                .with_detail("field", "file_name"));
        }
        if self.content_type.trim().is_empty() {
            return Err(AppError::validation("Content type is required")
                .with_detail("field", "content_type"));
        }
        if self.size < 1 {
            return Err(AppError::new(ErrorCode::EmptyFile));
        }
        let (max, prefix) = if self.is_image {
            (MAX_IMAGE_BYTES, "image/")
        } else {
            (MAX_VIDEO_BYTES, "video/")
        };
        if !self.content_type.starts_with(prefix) {
            return Err(AppError::new(ErrorCode::UnsupportedFileFormat)
                .with_detail("content_type", self.content_type.clone()));
        }
        if self.size > max {
            return Err(AppError::new(ErrorCode::FileTooLarge).with_detail("max_bytes", max));
        }
        Ok(())
    }
}

/// Presigned upload grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTicket {
    pub presigned_url: String,
    pub key: String,
}

/// Object deletion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteObjectRequest {
    pub key: String,
}
