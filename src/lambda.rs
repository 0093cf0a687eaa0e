//! Lambda entry points. Each deployed function runs the same binary with a
//! different subcommand, which selects one of these handlers.

use anyhow::Result;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;

use crate::errors::PipelineError;
use crate::handlers::{self, *};
use crate::model::StorageEvent;
use crate::services::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    MetadataTracker,
    EvaluationGate,
    Promote,
    Approval,
    StartIngestion,
    IngestionStatus,
    Chunker,
}

/// Object keys arrive form-encoded in S3 notifications (spaces as `+`).
pub fn decode_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .map_err(|e| PipelineError::InvalidEvent(format!("undecodable object key {:?}: {}", raw, e)))?;
    Ok(decoded.into_owned())
}

/// Flatten an S3 notification envelope into storage events, in record order.
pub fn storage_events(event: &S3Event) -> Result<Vec<StorageEvent>> {
    event
        .records
        .iter()
        .map(|record| {
            let event_name = record.event_name.as_deref().unwrap_or_default();
            let bucket = record
                .s3
                .bucket
                .name
                .clone()
                .ok_or_else(|| PipelineError::InvalidEvent("record has no bucket name".to_string()))?;
            let key = record
                .s3
                .object
                .key
                .as_deref()
                .ok_or_else(|| PipelineError::InvalidEvent("record has no object key".to_string()))
                .and_then(|k| decode_key(k).map_err(|e| PipelineError::InvalidEvent(e.to_string())))?;

            if event_name.starts_with("ObjectCreated") {
                Ok(StorageEvent::Created {
                    bucket,
                    key,
                    size: record.s3.object.size.unwrap_or(0),
                })
            } else if event_name.starts_with("ObjectRemoved") {
                Ok(StorageEvent::Removed { bucket, key })
            } else {
                Err(PipelineError::InvalidEvent(format!("unsupported event {:?}", event_name)).into())
            }
        })
        .collect()
}

/// Scheduled and pipeline invocations send arbitrary payloads; only an optional
/// description is read from them.
pub fn start_request(payload: Value) -> StartIngestionRequest {
    match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Ignoring unreadable start-ingestion payload: {}", e);
            StartIngestionRequest::default()
        }
    }
}

fn fail(function: Function, e: anyhow::Error) -> LambdaError {
    tracing::error!("{:?} failed: {:#}", function, e);
    e.into()
}

pub async fn run(function: Function, services: Services) -> Result<(), LambdaError> {
    tracing::info!("Starting Lambda handler {:?}", function);

    match function {
        Function::MetadataTracker => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<S3Event>| {
                let services = services.clone();
                async move {
                    let events = storage_events(&event.payload).map_err(|e| fail(function, e))?;
                    handlers::handle_events(&services, &events)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
        Function::EvaluationGate => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<EvaluationRequest>| {
                let services = services.clone();
                async move {
                    evaluate(&services, &event.payload)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
        Function::Promote => {
            lambda_runtime::run(service_fn(move |_event: LambdaEvent<Value>| {
                let services = services.clone();
                async move { promote(&services).await.map_err(|e| fail(function, e)) }
            }))
            .await
        }
        Function::Approval => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<ApprovalRequest>| {
                let services = services.clone();
                async move {
                    trigger_approval(&services, &event.payload)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
        Function::StartIngestion => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
                let services = services.clone();
                async move {
                    let request = start_request(event.payload);
                    start_ingestion(&services, Some(event.context.request_id.as_str()), &request)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
        Function::IngestionStatus => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<IngestionStatusRequest>| {
                let services = services.clone();
                async move {
                    ingestion_status(&services, &event.payload)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
        Function::Chunker => {
            lambda_runtime::run(service_fn(move |event: LambdaEvent<ChunkerRequest>| {
                let services = services.clone();
                async move {
                    tracing::debug!("Chunker input: {} files", event.payload.input_files.len());
                    run_chunker(&services, &event.payload)
                        .await
                        .map_err(|e| fail(function, e))
                }
            }))
            .await
        }
    }
}
