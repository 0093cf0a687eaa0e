use anyhow::Result;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::errors::PipelineError;
use crate::knowledge_base::IngestionRequest;
use crate::metrics::get_metrics_collector;
use crate::model::IngestionJob;
use crate::services::Services;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartIngestionRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatusRequest {
    pub ingestion_job_id: String,
}

fn data_source(settings: &Settings) -> Result<(&str, &str)> {
    Ok((
        Settings::require(&settings.knowledge_base_id, "KNOWLEDGE_BASE_ID")?,
        Settings::require(&settings.data_source_id, "DATA_SOURCE_ID")?,
    ))
}

/// Idempotency token for a start request. The knowledge base only accepts
/// 33-256 character tokens, so a caller's id is folded into a name-based UUID.
pub fn client_token(request_id: Option<&str>) -> String {
    match request_id.map(str::trim) {
        Some(id) if !id.is_empty() => Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Start an ingestion job. `request_id` is the invocation id and seeds the
/// idempotency token, so a redelivered invocation does not start a second job.
pub async fn start_ingestion(
    services: &Services,
    request_id: Option<&str>,
    request: &StartIngestionRequest,
) -> Result<IngestionJob> {
    let (knowledge_base_id, data_source_id) = data_source(&services.settings)?;
    let client_token = client_token(request_id);

    let job = services
        .knowledge_base
        .start_ingestion_job(&IngestionRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            data_source_id: data_source_id.to_string(),
            client_token,
            description: request.description.clone(),
        })
        .await?;

    tracing::info!(
        "Started ingestion job {} on {}/{} ({})",
        job.ingestion_job_id,
        knowledge_base_id,
        data_source_id,
        job.status
    );
    get_metrics_collector().track_metric("ingestion.started", 1.0);
    Ok(job)
}

pub async fn ingestion_status(services: &Services, request: &IngestionStatusRequest) -> Result<IngestionJob> {
    if request.ingestion_job_id.trim().is_empty() {
        return Err(PipelineError::InvalidEvent("ingestionJobId is required".to_string()).into());
    }
    let (knowledge_base_id, data_source_id) = data_source(&services.settings)?;

    let job = services
        .knowledge_base
        .get_ingestion_job(knowledge_base_id, data_source_id, &request.ingestion_job_id)
        .await?;
    tracing::debug!("Ingestion job {} is {}", job.ingestion_job_id, job.status);
    Ok(job)
}
