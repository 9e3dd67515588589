use super::{StorageError, StorageResult, StorageService};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, types::ObjectCannedAcl, Client as S3Client};
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::warn;

const MAX_ATTEMPTS: usize = 3;
const RETRY_INTERVAL_MS: u64 = 500;

/// Connection settings for an S3-compatible remote disk.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub base_url: String,
}

/// Remote disk backed by an S3-compatible bucket (AWS, DigitalOcean Spaces, R2).
///
/// Transient request failures are retried here; callers see a single
/// success or failure per call.
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    base_url: String,
}

impl S3Storage {
    pub async fn new(settings: S3Settings) -> StorageResult<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.access_key_id,
            settings.secret_access_key,
            None,
            None,
            "image-handler",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(settings.region))
            .endpoint_url(settings.endpoint)
            .load()
            .await;

        Ok(Self {
            client: S3Client::new(&config),
            bucket: settings.bucket,
            base_url: settings.base_url,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn retry_strategy() -> impl Iterator<Item = std::time::Duration> {
        FixedInterval::from_millis(RETRY_INTERVAL_MS).take(MAX_ATTEMPTS - 1)
    }
}

#[async_trait]
impl StorageService for S3Storage {
    async fn write(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<String> {
        Retry::spawn(Self::retry_strategy(), move || async move {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data.to_vec()))
                .content_type(content_type)
                .acl(ObjectCannedAcl::PublicRead)
                .send()
                .await
                .map_err(|e| {
                    warn!("S3 put of {} failed: {}", key, e);
                    StorageError::WriteFailed(format!("Failed to upload {}: {}", key, e))
                })
        })
        .await?;

        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        // S3 reports success for keys that do not exist.
        Retry::spawn(Self::retry_strategy(), move || async move {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    warn!("S3 delete of {} failed: {}", key, e);
                    StorageError::DeleteFailed(format!("Failed to delete {}: {}", key, e))
                })
        })
        .await?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::BackendError(format!(
                "Failed to check {}: {}",
                key, e
            ))),
        }
    }
}
