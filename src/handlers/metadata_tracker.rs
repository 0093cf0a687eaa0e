use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::defaults::SIDECAR_SUFFIX;
use crate::metrics::get_metrics_collector;
use crate::model::*;
use crate::services::Services;
use crate::table::UpdateOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackAction {
    Upserted,
    MarkedDeleted,
    /// Delete notification for an object the table never saw.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOutcome {
    pub s3_location: String,
    pub file_type: FileType,
    pub action: TrackAction,
}

pub fn file_type_for_bucket(bucket: &str, processed_marker: &str) -> FileType {
    if bucket.to_lowercase().contains(&processed_marker.to_lowercase()) {
        FileType::Processed
    } else {
        FileType::Raw
    }
}

/// Lowercased extension of the final path segment, or "unknown".
pub fn detect_format(key: &str) -> String {
    static EXTENSION: OnceLock<Regex> = OnceLock::new();
    let re = EXTENSION.get_or_init(|| Regex::new(r"\.([A-Za-z0-9]+)$").expect("static regex"));

    let file_name = key.rsplit('/').next().unwrap_or(key);
    re.captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

fn seeded_ingestion_status(file_type: FileType) -> IngestionStatus {
    match file_type {
        FileType::Raw => IngestionStatus::NotApplicable,
        FileType::Processed => IngestionStatus::Pending,
    }
}

pub async fn handle_event(services: &Services, event: &StorageEvent) -> Result<TrackOutcome> {
    let file_type = file_type_for_bucket(event.bucket(), &services.settings.processed_marker);
    let key = RecordKey::new(event.bucket(), event.key(), file_type);

    match event {
        StorageEvent::Created { bucket, key: object_key, size } => {
            let sidecar = format!("{}{}", object_key, SIDECAR_SUFFIX);
            let has_metadata = services
                .objects
                .object_exists(bucket, &sidecar)
                .await
                .with_context(|| format!("Failed to check sidecar {}", sidecar))?;

            // A new upload replaces the row, so new content is evaluated afresh.
            let record = FileRecord {
                s3_location: key.s3_location.clone(),
                file_type,
                bucket: bucket.clone(),
                key: object_key.clone(),
                size: *size,
                file_format: detect_format(object_key),
                has_metadata,
                status: FileStatus::Active,
                ingestion_status: seeded_ingestion_status(file_type),
                evaluation_status: EvaluationStatus::Pending,
                evaluation_timestamp: None,
                last_modified: Utc::now().to_rfc3339(),
            };
            services.table.put_record(&record).await?;

            tracing::info!(
                "Tracked {} as {} ({}, metadata: {})",
                record.s3_location,
                file_type,
                record.file_format,
                has_metadata
            );
            get_metrics_collector().track_metric("tracker.upserted", 1.0);

            Ok(TrackOutcome {
                s3_location: key.s3_location,
                file_type,
                action: TrackAction::Upserted,
            })
        }
        StorageEvent::Removed { .. } => {
            let action = match services.table.mark_deleted(&key).await? {
                UpdateOutcome::Missing => {
                    tracing::warn!("Delete for untracked object {} ({})", key.s3_location, file_type);
                    get_metrics_collector().track_metric("tracker.missing", 1.0);
                    TrackAction::Missing
                }
                _ => {
                    tracing::info!("Marked {} deleted", key.s3_location);
                    get_metrics_collector().track_metric("tracker.deleted", 1.0);
                    TrackAction::MarkedDeleted
                }
            };

            Ok(TrackOutcome {
                s3_location: key.s3_location,
                file_type,
                action,
            })
        }
    }
}

/// Process a notification batch in order; the first failure aborts the batch.
pub async fn handle_events(services: &Services, events: &[StorageEvent]) -> Result<Vec<TrackOutcome>> {
    let _measurement = crate::measure_operation!("tracker.handle_events");
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        match handle_event(services, event).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!("Failed to track {}/{}: {:#}", event.bucket(), event.key(), e);
                return Err(e);
            }
        }
    }
    Ok(outcomes)
}
