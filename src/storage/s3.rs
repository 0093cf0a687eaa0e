use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use bytes::Bytes;

use super::ObjectStore;
use crate::model::{normalize_etag, ObjectEntry};

#[derive(Clone)]
pub struct S3Client {
    pub client: Client,
}

impl S3Client {
    pub fn new(config: &aws_config::SdkConfig, endpoint_url: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(config);
        if let Some(endpoint) = endpoint_url {
            // Local S3-compatible endpoints (MinIO, LocalStack) need path-style addressing.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("Failed to list objects in {}", bucket))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0),
                        etag: object.e_tag().map(normalize_etag).unwrap_or_default(),
                    });
                }
            }

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!("Listed {} objects in s3://{}/{}", entries.len(), bucket, prefix);
        Ok(entries)
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!("Failed to head object s3://{}/{}: {:?}", bucket, key, e))
                }
            }
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", bucket, key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read object body")?;

        Ok(data.into_bytes())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        tracing::debug!("S3 put_object - bucket: {}, key: {}, data_size: {}", bucket, key, data.len());

        match self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!("S3 put_object failed - key: {}, detailed_error: {:?}", key, e);
                Err(anyhow::anyhow!("Failed to put object {}: {:?}", key, e))
            }
        }
    }

    async fn copy_object(&self, src_bucket: &str, key: &str, dst_bucket: &str) -> Result<()> {
        let source = format!("{}/{}", src_bucket, urlencoding::encode(key));
        self.client
            .copy_object()
            .copy_source(source)
            .bucket(dst_bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to copy {} from {} to {}", key, src_bucket, dst_bucket))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete object s3://{}/{}", bucket, key))?;
        Ok(())
    }
}
