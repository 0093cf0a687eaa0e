//! Object storage seam. The S3 client backs Lambda deployments; the in-memory
//! store backs local dry runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::model::ObjectEntry;

mod memory;
#[cfg(feature = "aws")]
mod s3;

pub use memory::MemoryObjectStore;
#[cfg(feature = "aws")]
pub use s3::S3Client;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object under `prefix`, across all listing pages.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>>;

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    /// Copy `key` from `src_bucket` to the same key in `dst_bucket`.
    async fn copy_object(&self, src_bucket: &str, key: &str, dst_bucket: &str) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}
