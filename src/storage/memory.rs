use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use super::ObjectStore;
use crate::errors::PipelineError;
use crate::model::ObjectEntry;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
}

/// Bucket -> key -> object, kept ordered so listings are deterministic.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held in `bucket`, in order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>> {
        match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn content_tag(data: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn missing(bucket: &str, key: &str) -> anyhow::Error {
        PipelineError::StorageError(format!("no such object: s3://{}/{}", bucket, key)).into()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let buckets = self.lock();
        let entries = buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, object)| ObjectEntry {
                        key: key.clone(),
                        size: object.data.len() as i64,
                        etag: object.etag.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self
            .lock()
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
            .ok_or_else(|| Self::missing(bucket, key))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let etag = Self::content_tag(&data);
        self.lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject { data, etag });
        Ok(())
    }

    async fn copy_object(&self, src_bucket: &str, key: &str, dst_bucket: &str) -> Result<()> {
        let mut buckets = self.lock();
        let object = buckets
            .get(src_bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| Self::missing(src_bucket, key))?;
        buckets
            .entry(dst_bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        // S3 deletes are idempotent; mirror that.
        if let Some(objects) = self.lock().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}
