use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::storage::{ObjectStore, StorageError};

/// S3 configuration shared across deployments.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Base URL for public access (CDN or bucket domain)
    pub public_base_url: String,
}

impl StorageConfig {
    /// Load storage configuration from environment variables.
    ///
    /// `STORAGE_BUCKET` and `STORAGE_PUBLIC_BASE_URL` are required;
    /// `AWS_REGION` defaults to `us-east-1`.
    pub fn from_env() -> Result<Self, StorageError> {
        let bucket = std::env::var("STORAGE_BUCKET").map_err(|_| StorageError::Configuration {
            message: "STORAGE_BUCKET must be set".into(),
        })?;
        let public_base_url =
            std::env::var("STORAGE_PUBLIC_BASE_URL").map_err(|_| StorageError::Configuration {
                message: "STORAGE_PUBLIC_BASE_URL must be set".into(),
            })?;
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        Ok(Self {
            bucket,
            region,
            public_base_url,
        })
    }

    /// Stable public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

/// Object store backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Arc<Client>,
    config: StorageConfig,
}

impl S3ObjectStore {
    /// Create a store with configuration taken from the environment.
    pub async fn from_env() -> Result<Self, StorageError> {
        let config = StorageConfig::from_env()?;
        Ok(Self::with_config(config).await)
    }

    /// Create a store with explicit configuration; AWS credentials and
    /// endpoint resolution still come from the standard environment chain.
    pub async fn with_config(config: StorageConfig) -> Self {
        let aws_config = aws_config::load_from_env().await;
        let client = Client::new(&aws_config);
        Self {
            client: Arc::new(client),
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<String, StorageError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .content_disposition(content_disposition)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        debug!(
            target: "image_sdk::storage::s3",
            key,
            size,
            bucket = %self.config.bucket,
            "object uploaded"
        );
        Ok(self.config.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::StorageConfig;

    fn test_config() -> StorageConfig {
        StorageConfig {
            bucket: "generated-assets".to_string(),
            region: "us-east-1".to_string(),
            public_base_url: "https://cdn.example.com/".to_string(),
        }
    }

    #[test]
    fn public_url_joins_base_and_key_without_double_slash() {
        let config = test_config();
        assert_eq!(
            config.public_url("generations/1700000000000-0.png"),
            "https://cdn.example.com/generations/1700000000000-0.png"
        );
        assert_eq!(
            config.public_url("/generations/a.png"),
            "https://cdn.example.com/generations/a.png"
        );
    }
}
