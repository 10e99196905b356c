//! Object storage used to stage job artifacts.

use std::path::Path;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use tracing::trace;

use crate::error::UploadError;

pub mod upload;

/// Files at or above this size go through a multipart upload.
pub const MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes the file at `path` to `bucket`/`key`, replacing any object
    /// already stored there.
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), UploadError>;
}

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(Client::new(config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), UploadError> {
        let file_size = tokio::fs::metadata(path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        trace!("bucket:      {}", bucket);
        trace!("key:         {}", key);
        trace!("size:        {}", file_size);

        let result = if file_size >= MULTIPART_THRESHOLD {
            upload::upload_parts(&self.client, bucket, key, path, file_size).await
        } else {
            upload::upload_file(&self.client, bucket, key, path).await
        };
        result.map_err(|message| UploadError::Put {
            path: path.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        })
    }
}
