//! Scoped presigned-upload avatar storage, grounded on the same
//! `aws-sdk-s3` presigning idiom used for chat attachment uploads elsewhere
//! in the pack.

use std::time::Duration;

use aws_sdk_s3::{config::StalledStreamProtectionConfig, presigning::PresigningConfig, Client};

use crate::error::{Error, Result};

const PRESIGN_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AvatarStore {
    client: Client,
    bucket: String,
    max_bytes: u64,
    allowed_types: Vec<String>,
}

impl AvatarStore {
    pub async fn new(bucket: impl Into<String>, max_size_mb: u32, allowed_types: Vec<String>) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.into(),
            max_bytes: u64::from(max_size_mb) * 1024 * 1024,
            allowed_types,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Issues a presigned `PUT` scoped to `content_type`, rejecting MIME
    /// types outside `allowed_types` before ever talking to S3.
    pub async fn presign_upload(&self, key: &str, content_type: &str) -> Result<(String, Duration)> {
        if !self.allowed_types.iter().any(|t| t == content_type) {
            return Err(Error::Validation(format!("content type {content_type} is not allowed for avatars")));
        }

        let presign_config = PresigningConfig::builder()
            .expires_in(PRESIGN_TTL)
            .build()
            .map_err(|e| Error::Internal(format!("build presigning config: {e}")))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| Error::DependencyUnavailable(format!("s3 presign failed: {e}")))?;

        Ok((presigned.uri().to_string(), PRESIGN_TTL))
    }

    /// Verifies an uploaded object's size and content-type are within
    /// bounds via `HEAD`, rejecting (without attaching the key) on anything
    /// outside the scoped constraints or a missing object.
    pub async fn verify_uploaded(&self, key: &str) -> Result<()> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Validation(format!("avatar object not found or inaccessible: {e}")))?;

        let size = head.content_length().unwrap_or(-1);
        if size < 0 || size as u64 > self.max_bytes {
            return Err(Error::Validation(format!("avatar exceeds the {} byte limit", self.max_bytes)));
        }

        let content_type = head.content_type().unwrap_or_default();
        if !self.allowed_types.iter().any(|t| t == content_type) {
            return Err(Error::Validation(format!("avatar content type {content_type} is not allowed")));
        }

        Ok(())
    }
}
