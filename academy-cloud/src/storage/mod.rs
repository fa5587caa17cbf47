//! Object storage (S3-compatible) for course covers, lesson videos and thumbnails

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;

use crate::error::BoxError;

/// Presigned upload URLs expire after 6 minutes
const PRESIGN_EXPIRY_SECS: u64 = 360;

/// Object-storage collaborator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Presigned PUT URL for a direct browser upload
    async fn presign_put(&self, key: &str, content_type: &str, size: i64)
    -> Result<String, BoxError>;

    async fn delete_object(&self, key: &str) -> Result<(), BoxError>;

    /// Public URL of an object
    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
    public_host: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: &str, public_host: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            public_host: public_host.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        size: i64,
    ) -> Result<String, BoxError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(PRESIGN_EXPIRY_SECS))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size)
            .presigned(presigning)
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BoxError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.bucket, &self.public_host, key)
    }
}

/// `https://{bucket}.{host}/{key}` with the key percent-encoded as one path segment
pub fn public_object_url(bucket: &str, host: &str, key: &str) -> String {
    let base = format!("https://{bucket}.{host}/");
    match reqwest::Url::parse(&base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.clear().push(key);
            }
            url.to_string()
        }
        Err(_) => format!("{base}{key}"),
    }
}

/// Storage key for a new upload: `{uuid}-{file_name}`
pub fn upload_key(file_name: &str) -> String {
    format!("{}-{}", uuid::Uuid::new_v4(), file_name.trim())
}
