use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client};
use serde_json::Value;
use std::collections::HashMap;

use super::{MetadataTable, UpdateOutcome};
use crate::errors::PipelineError;
use crate::model::{EvaluationStatus, FileRecord, FileStatus, RecordKey};
use crate::record_filter::RecordFilter;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB table keyed on (`s3_location`, `file_type`).
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    table_name: String,
}

impl DynamoTable {
    pub fn new(config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            table_name: table_name.into(),
        }
    }

    fn key_attributes(key: &RecordKey) -> Item {
        HashMap::from([
            ("s3_location".to_string(), AttributeValue::S(key.s3_location.clone())),
            ("file_type".to_string(), AttributeValue::S(key.file_type.as_str().to_string())),
        ])
    }
}

#[async_trait]
impl MetadataTable for DynamoTable {
    async fn put_record(&self, record: &FileRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .with_context(|| format!("Failed to put record {}", record.s3_location))?;
        Ok(())
    }

    async fn get_record(&self, key: &RecordKey) -> Result<Option<FileRecord>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .with_context(|| format!("Failed to get record {}", key.s3_location))?;

        response.item().map(item_to_record).transpose()
    }

    async fn mark_deleted(&self, key: &RecordKey) -> Result<UpdateOutcome> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .update_expression("SET #status = :deleted")
            .condition_expression("attribute_exists(s3_location)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":deleted", AttributeValue::S(FileStatus::Deleted.as_str().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(e) => {
                if e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false)
                {
                    Ok(UpdateOutcome::Missing)
                } else {
                    Err(anyhow::anyhow!("Failed to mark {} deleted: {:?}", key.s3_location, e))
                }
            }
        }
    }

    async fn record_evaluation(
        &self,
        key: &RecordKey,
        outcome: EvaluationStatus,
        timestamp: &str,
    ) -> Result<UpdateOutcome> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .update_expression("SET #eval = :outcome, #ts = :ts")
            .condition_expression("attribute_exists(s3_location) AND #eval = :pending")
            .expression_attribute_names("#eval", "evaluation_status")
            .expression_attribute_names("#ts", "evaluation_timestamp")
            .expression_attribute_values(":outcome", AttributeValue::S(outcome.as_str().to_string()))
            .expression_attribute_values(":ts", AttributeValue::S(timestamp.to_string()))
            .expression_attribute_values(
                ":pending",
                AttributeValue::S(EvaluationStatus::Pending.as_str().to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(e) => {
                if e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false)
                {
                    // Either the row vanished or it already left pending.
                    match self.get_record(key).await? {
                        Some(_) => Ok(UpdateOutcome::Skipped),
                        None => Ok(UpdateOutcome::Missing),
                    }
                } else {
                    Err(anyhow::anyhow!("Failed to record evaluation for {}: {:?}", key.s3_location, e))
                }
            }
        }
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>> {
        let expression = filter.to_expression();
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take());

            if let Some(expr) = &expression {
                request = request.filter_expression(&expr.expression);
                for (placeholder, field) in &expr.names {
                    request = request.expression_attribute_names(placeholder, field);
                }
                for (placeholder, value) in &expr.values {
                    request = request.expression_attribute_values(placeholder, json_to_attribute(value));
                }
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to scan {}", self.table_name))?;

            for item in response.items() {
                records.push(item_to_record(item)?);
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        tracing::debug!("Scanned {} records from {}", records.len(), self.table_name);
        Ok(records)
    }
}

fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Null => AttributeValue::Null(true),
        other => AttributeValue::S(other.to_string()),
    }
}

fn record_to_item(record: &FileRecord) -> Item {
    let mut item = HashMap::from([
        ("s3_location".to_string(), AttributeValue::S(record.s3_location.clone())),
        ("file_type".to_string(), AttributeValue::S(record.file_type.as_str().to_string())),
        ("bucket".to_string(), AttributeValue::S(record.bucket.clone())),
        ("key".to_string(), AttributeValue::S(record.key.clone())),
        ("size".to_string(), AttributeValue::N(record.size.to_string())),
        ("file_format".to_string(), AttributeValue::S(record.file_format.clone())),
        ("has_metadata".to_string(), AttributeValue::Bool(record.has_metadata)),
        ("status".to_string(), AttributeValue::S(record.status.as_str().to_string())),
        (
            "ingestion_status".to_string(),
            AttributeValue::S(record.ingestion_status.as_str().to_string()),
        ),
        (
            "evaluation_status".to_string(),
            AttributeValue::S(record.evaluation_status.as_str().to_string()),
        ),
        ("last_modified".to_string(), AttributeValue::S(record.last_modified.clone())),
    ]);
    if let Some(ts) = &record.evaluation_timestamp {
        item.insert("evaluation_timestamp".to_string(), AttributeValue::S(ts.clone()));
    }
    item
}

fn item_to_record(item: &Item) -> Result<FileRecord> {
    Ok(FileRecord {
        s3_location: string_attr(item, "s3_location")?,
        file_type: string_attr(item, "file_type")?.parse()?,
        bucket: string_attr(item, "bucket")?,
        key: string_attr(item, "key")?,
        size: item
            .get("size")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0),
        file_format: string_attr(item, "file_format")?,
        has_metadata: item
            .get("has_metadata")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        status: string_attr(item, "status")?.parse()?,
        ingestion_status: string_attr(item, "ingestion_status")?.parse()?,
        evaluation_status: string_attr(item, "evaluation_status")?.parse()?,
        evaluation_timestamp: item
            .get("evaluation_timestamp")
            .and_then(|v| v.as_s().ok())
            .cloned(),
        last_modified: item
            .get("last_modified")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default(),
    })
}

fn string_attr(item: &Item, name: &str) -> Result<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| PipelineError::StorageError(format!("record missing string attribute {}", name)).into())
}
