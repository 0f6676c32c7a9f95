//! Asset store interface
//!
//! Content-addressable blob storage organized into namespaces: the source
//! namespace holds assets awaiting playback, the reproduced namespace holds
//! archived copies of assets that played successfully.

pub mod s3;

pub use s3::S3AssetStore;

use crate::error::Result;
use async_trait::async_trait;

/// Storage namespace within the work bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Bucket root: assets waiting to be played
    Source,
    /// `reproduced/` prefix: archived copies of played assets
    Reproduced,
}

impl Namespace {
    /// Object key for `name` within this namespace.
    pub fn key_for(&self, name: &str) -> String {
        match self {
            Namespace::Source => name.to_string(),
            Namespace::Reproduced => format!("reproduced/{}", name),
        }
    }
}

/// Capability interface over the external blob store.
///
/// Implementations must be safe to call from the single consumer task; no
/// shared mutable state is expected between invocations.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch the named asset from the source namespace.
    ///
    /// # Errors
    /// - `Error::AssetNotFound` if no such object exists
    /// - `Error::Transfer` if the store is unreachable or denies the request
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    /// Store bytes under `name` in the given namespace.
    async fn put(&self, namespace: Namespace, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete the named object from the given namespace.
    async fn delete(&self, namespace: Namespace, name: &str) -> Result<()>;
}
