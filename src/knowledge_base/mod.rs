//! Managed knowledge-base seam: start and inspect ingestion jobs.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::IngestionJob;

#[cfg(feature = "aws")]
mod bedrock;
mod memory;

#[cfg(feature = "aws")]
pub use bedrock::BedrockKnowledgeBase;
pub use memory::MemoryKnowledgeBase;

/// Length bounds the managed service enforces on `client_token`.
pub const CLIENT_TOKEN_LEN: std::ops::RangeInclusive<usize> = 33..=256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionRequest {
    pub knowledge_base_id: String,
    pub data_source_id: String,
    /// Idempotency key; repeated starts with the same token return the same job.
    pub client_token: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn start_ingestion_job(&self, request: &IngestionRequest) -> Result<IngestionJob>;

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob>;
}
