//! Local HTTP gateway. Exposes each handler as a JSON route so the pipeline
//! steps can be driven without the Lambda runtime.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::errors::PipelineError;
use crate::handlers::{self, *};
use crate::metrics::get_metrics_collector;
use crate::model::{FileRecord, StorageEvent};
use crate::record_filter::RecordFilter;
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

/// Handler failure rendered as a JSON `{ "error": ... }` body.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<PipelineError>() {
            Some(PipelineError::InvalidEvent(_)) => StatusCode::BAD_REQUEST,
            Some(PipelineError::ApprovalTokenNotFound { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!("Request failed ({}): {:#}", status, self.0);
        (status, Json(json!({ "error": format!("{:#}", self.0) }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "version": crate::VERSION}))
}

async fn metrics() -> impl IntoResponse {
    Json(get_metrics_collector().snapshot())
}

async fn storage_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<StorageEvent>>,
) -> ApiResult<Vec<TrackOutcome>> {
    Ok(Json(handlers::handle_events(&state.services, &events).await?))
}

async fn evaluate_batch(
    State(state): State<AppState>,
    Json(request): Json<EvaluationRequest>,
) -> ApiResult<EvaluationReport> {
    Ok(Json(evaluate(&state.services, &request).await?))
}

async fn promote_qa(State(state): State<AppState>) -> ApiResult<PromotionReport> {
    Ok(Json(promote(&state.services).await?))
}

async fn approve(
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> ApiResult<ApprovalOutcome> {
    Ok(Json(trigger_approval(&state.services, &request).await?))
}

/// `x-request-id`, when present, is the idempotency token for the job.
async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<StartIngestionRequest>>,
) -> ApiResult<crate::model::IngestionJob> {
    let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(start_ingestion(&state.services, request_id, &request).await?))
}

async fn ingest_status(
    State(state): State<AppState>,
    Json(request): Json<IngestionStatusRequest>,
) -> ApiResult<crate::model::IngestionJob> {
    Ok(Json(ingestion_status(&state.services, &request).await?))
}

async fn chunk(
    State(state): State<AppState>,
    Json(request): Json<ChunkerRequest>,
) -> ApiResult<ChunkerResponse> {
    Ok(Json(run_chunker(&state.services, &request).await?))
}

fn query_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else if let Ok(n) = raw.parse::<i64>() {
        Value::from(n)
    } else {
        Value::String(raw.to_string())
    }
}

/// `GET /records?evaluation_status=pending&file_type=processed`: every query
/// parameter is an equality condition on the record field of the same name.
async fn records(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<FileRecord>> {
    let mut fields: Vec<_> = params.into_iter().collect();
    fields.sort();
    let filter = fields
        .into_iter()
        .fold(RecordFilter::new(), |filter, (field, value)| filter.equals(field, query_value(&value)));

    let mut rows = state.services.table.scan(&filter).await?;
    rows.sort_by(|a, b| a.s3_location.cmp(&b.s3_location));
    Ok(Json(rows))
}

pub fn router(services: Services) -> Router {
    let state = AppState { services };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/records", get(records))
        .route("/events/storage", post(storage_events))
        .route("/evaluate", post(evaluate_batch))
        .route("/promote", post(promote_qa))
        .route("/approve", post(approve))
        .route("/ingest", post(ingest))
        .route("/ingest/status", post(ingest_status))
        .route("/chunk", post(chunk))
        .with_state(state)
}

pub async fn run(services: Services) -> anyhow::Result<()> {
    let addr = services.settings.api_addr.clone();
    let app = router(services);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("API listening on {addr}");
    serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Settings;

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Services::in_memory(Settings::default()));
        let (status, body) = call(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_tracked_events_are_listed_and_filtered() {
        let services = Services::in_memory(Settings::default());

        let (status, body) = call(
            router(services.clone()),
            "POST",
            "/events/storage",
            Some(json!([
                {"eventType": "created", "bucket": "docs-raw", "key": "a.pdf", "size": 5},
                {"eventType": "created", "bucket": "docs-processed", "key": "a.json", "size": 7}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (status, body) = call(router(services.clone()), "GET", "/records", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (_, body) = call(router(services), "GET", "/records?file_type=processed", None).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["key"], "a.json");
        assert_eq!(rows[0]["evaluation_status"], "pending");
    }

    #[tokio::test]
    async fn test_evaluate_marks_pending_rows() {
        let services = Services::in_memory(Settings::default());
        call(
            router(services.clone()),
            "POST",
            "/events/storage",
            Some(json!([{"eventType": "created", "bucket": "docs-processed", "key": "a.json", "size": 7}])),
        )
        .await;

        let (status, body) = call(router(services.clone()), "POST", "/evaluate", Some(json!({"successRate": 0.95}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "passed");

        let (_, rows) = call(router(services), "GET", "/records?evaluation_status=passed", None).await;
        assert_eq!(rows.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_short_request_id_still_starts_ingestion() {
        let app = router(Services::in_memory(Settings {
            knowledge_base_id: Some("KB123".to_string()),
            data_source_id: Some("DS456".to_string()),
            ..Settings::default()
        }));
        let request = Request::builder()
            .method("POST")
            .uri("/ingest")
            .header("content-type", "application/json")
            .header("x-request-id", "req-1")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let job: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(job["status"], "STARTING");
    }

    #[tokio::test]
    async fn test_invalid_event_is_bad_request() {
        let app = router(Services::in_memory(Settings::default()));
        let (status, body) = call(
            app,
            "POST",
            "/chunk",
            Some(json!({"bucketName": "kb", "inputFiles": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("inputFiles"));
    }

    #[tokio::test]
    async fn test_missing_approval_token_is_conflict() {
        let app = router(Services::in_memory(Settings {
            pipeline_name: Some("rag-pipeline".to_string()),
            ..Settings::default()
        }));
        let (status, _) = call(app, "POST", "/approve", Some(json!({"verdict": "success"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_missing_configuration_is_server_error() {
        let app = router(Services::in_memory(Settings::default()));
        let (status, body) = call(app, "POST", "/promote", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("QA_BUCKET"));
    }
}
