use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{IngestionRequest, KnowledgeBase, CLIENT_TOKEN_LEN};
use crate::errors::PipelineError;
use crate::model::IngestionJob;

#[derive(Default)]
struct Jobs {
    by_id: HashMap<String, IngestionJob>,
    by_token: HashMap<String, String>,
}

/// Knowledge base that starts jobs in STARTING state and honours client tokens.
#[derive(Default)]
pub struct MemoryKnowledgeBase {
    jobs: Mutex<Jobs>,
}

impl MemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.lock().by_id.len()
    }

    /// Move a job to a new status, as the managed service would while indexing.
    pub fn set_status(&self, ingestion_job_id: &str, status: &str) {
        if let Some(job) = self.lock().by_id.get_mut(ingestion_job_id) {
            job.status = status.to_string();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Jobs> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl KnowledgeBase for MemoryKnowledgeBase {
    async fn start_ingestion_job(&self, request: &IngestionRequest) -> Result<IngestionJob> {
        if !CLIENT_TOKEN_LEN.contains(&request.client_token.len()) {
            return Err(PipelineError::InvalidEvent(format!(
                "clientToken must be {}-{} characters, got {}",
                CLIENT_TOKEN_LEN.start(),
                CLIENT_TOKEN_LEN.end(),
                request.client_token.len()
            ))
            .into());
        }

        let mut jobs = self.lock();
        if let Some(existing) = jobs.by_token.get(&request.client_token) {
            if let Some(job) = jobs.by_id.get(existing) {
                return Ok(job.clone());
            }
        }

        let job = IngestionJob {
            ingestion_job_id: uuid::Uuid::new_v4().simple().to_string()[..10].to_uppercase(),
            knowledge_base_id: request.knowledge_base_id.clone(),
            data_source_id: request.data_source_id.clone(),
            status: "STARTING".to_string(),
            statistics: None,
        };
        jobs.by_token
            .insert(request.client_token.clone(), job.ingestion_job_id.clone());
        jobs.by_id.insert(job.ingestion_job_id.clone(), job.clone());
        Ok(job)
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob> {
        self.lock()
            .by_id
            .get(ingestion_job_id)
            .filter(|job| job.knowledge_base_id == knowledge_base_id && job.data_source_id == data_source_id)
            .cloned()
            .ok_or_else(|| {
                PipelineError::InvalidEvent(format!("unknown ingestion job {}", ingestion_job_id)).into()
            })
    }
}
