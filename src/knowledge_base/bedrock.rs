use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockagent::{types::IngestionJob as SdkIngestionJob, Client};

use super::{IngestionRequest, KnowledgeBase};
use crate::errors::PipelineError;
use crate::model::{IngestionJob, IngestionStatistics};

#[derive(Clone)]
pub struct BedrockKnowledgeBase {
    client: Client,
}

impl BedrockKnowledgeBase {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn convert_job(job: &SdkIngestionJob) -> IngestionJob {
    IngestionJob {
        ingestion_job_id: job.ingestion_job_id().to_string(),
        knowledge_base_id: job.knowledge_base_id().to_string(),
        data_source_id: job.data_source_id().to_string(),
        status: job.status().as_str().to_string(),
        statistics: job.statistics().map(|stats| IngestionStatistics {
            documents_scanned: stats.number_of_documents_scanned(),
            documents_indexed: stats.number_of_new_documents_indexed() + stats.number_of_modified_documents_indexed(),
            documents_failed: stats.number_of_documents_failed(),
        }),
    }
}

#[async_trait]
impl KnowledgeBase for BedrockKnowledgeBase {
    async fn start_ingestion_job(&self, request: &IngestionRequest) -> Result<IngestionJob> {
        let response = self
            .client
            .start_ingestion_job()
            .knowledge_base_id(&request.knowledge_base_id)
            .data_source_id(&request.data_source_id)
            .client_token(&request.client_token)
            .set_description(request.description.clone())
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to start ingestion job for {}/{}",
                    request.knowledge_base_id, request.data_source_id
                )
            })?;

        response
            .ingestion_job()
            .map(convert_job)
            .ok_or_else(|| PipelineError::StorageError("start_ingestion_job returned no job".to_string()).into())
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob> {
        let response = self
            .client
            .get_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .ingestion_job_id(ingestion_job_id)
            .send()
            .await
            .with_context(|| format!("Failed to get ingestion job {}", ingestion_job_id))?;

        response
            .ingestion_job()
            .map(convert_job)
            .ok_or_else(|| PipelineError::StorageError(format!("ingestion job {} not returned", ingestion_job_id)).into())
    }
}
