//! Durable object storage for generated assets.
//!
//! Providers hand back transient asset URLs; persisting them behind a stable
//! public URL goes through the [`ObjectStore`] seam so models stay testable
//! against in-memory stores.

pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

pub use s3::{S3ObjectStore, StorageConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage configuration error: {message}")]
    Configuration { message: String },
    #[error("upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` under `key` and return the stable public URL.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<String, StorageError>;
}
