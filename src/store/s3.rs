//! MinIO-backed asset store
//!
//! Talks to a MinIO (S3-compatible) endpoint using path-style addressing.
//! All assets live in a single work bucket; namespaces map to key prefixes.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{AssetStore, Namespace};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tracing::debug;

/// Asset store backed by a MinIO bucket.
pub struct S3AssetStore {
    bucket: Bucket,
}

impl S3AssetStore {
    /// Connect to the configured MinIO endpoint.
    ///
    /// # Errors
    /// Returns `Error::Config` if the credentials or endpoint are unusable.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let region = Region::Custom {
            region: "us-east-1".to_string(),
            endpoint: config.endpoint(),
        };

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("Invalid store credentials: {}", e)))?;

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| Error::Config(format!("Invalid store endpoint: {}", e)))?
            .with_path_style();

        debug!("Asset store ready: bucket '{}' at {}", config.bucket, config.endpoint());

        Ok(Self { bucket })
    }

    /// Translate an S3 client error for `name` into the crate taxonomy.
    fn map_error(name: &str, error: S3Error) -> Error {
        match error {
            S3Error::Http(404, _) => Error::AssetNotFound(name.to_string()),
            other => Error::Transfer(other.to_string()),
        }
    }

    /// Map a response that came back without a client error.
    fn check_status(name: &str, status: u16) -> Result<()> {
        match status {
            200..=299 => Ok(()),
            404 => Err(Error::AssetNotFound(name.to_string())),
            other => Err(Error::Transfer(format!(
                "store returned status {} for '{}'",
                other, name
            ))),
        }
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let key = Namespace::Source.key_for(name);
        let response = self
            .bucket
            .get_object(&key)
            .await
            .map_err(|e| Self::map_error(name, e))?;

        Self::check_status(name, response.status_code())?;
        Ok(response.as_slice().to_vec())
    }

    async fn put(&self, namespace: Namespace, name: &str, bytes: &[u8]) -> Result<()> {
        let key = namespace.key_for(name);
        let response = self
            .bucket
            .put_object(&key, bytes)
            .await
            .map_err(|e| Self::map_error(name, e))?;

        Self::check_status(name, response.status_code())
    }

    async fn delete(&self, namespace: Namespace, name: &str) -> Result<()> {
        let key = namespace.key_for(name);
        let response = self
            .bucket
            .delete_object(&key)
            .await
            .map_err(|e| Self::map_error(name, e))?;

        Self::check_status(name, response.status_code())
    }
}
