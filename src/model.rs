use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::PipelineError;

/// Logical type of a tracked file, derived from the bucket it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Raw,
    Processed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    NotApplicable,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Passed,
    Failed,
}

/// Outcome of an evaluation batch, also the input to the approval trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[serde(alias = "success")]
    Passed,
    #[serde(alias = "failure")]
    Failed,
}

impl From<Verdict> for EvaluationStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => EvaluationStatus::Passed,
            Verdict::Failed => EvaluationStatus::Failed,
        }
    }
}

macro_rules! string_enum {
    ($ty:ident { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PipelineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(PipelineError::StorageError(format!(
                        "unexpected {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum!(FileType { FileType::Raw => "raw", FileType::Processed => "processed" });
string_enum!(FileStatus { FileStatus::Active => "active", FileStatus::Deleted => "deleted" });
string_enum!(IngestionStatus {
    IngestionStatus::NotApplicable => "not_applicable",
    IngestionStatus::Pending => "pending",
});
string_enum!(EvaluationStatus {
    EvaluationStatus::Pending => "pending",
    EvaluationStatus::Passed => "passed",
    EvaluationStatus::Failed => "failed",
});
string_enum!(Verdict { Verdict::Passed => "passed", Verdict::Failed => "failed" });

/// Composite key of a FileRecord.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub s3_location: String,
    pub file_type: FileType,
}

impl RecordKey {
    pub fn new(bucket: &str, key: &str, file_type: FileType) -> Self {
        Self {
            s3_location: s3_location(bucket, key),
            file_type,
        }
    }
}

pub fn s3_location(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Per-object lifecycle row in the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub s3_location: String,
    pub file_type: FileType,
    pub bucket: String,
    pub key: String,
    pub size: i64,
    pub file_format: String,
    pub has_metadata: bool,
    pub status: FileStatus,
    pub ingestion_status: IngestionStatus,
    pub evaluation_status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_timestamp: Option<String>,
    pub last_modified: String,
}

impl FileRecord {
    pub fn record_key(&self) -> RecordKey {
        RecordKey {
            s3_location: self.s3_location.clone(),
            file_type: self.file_type,
        }
    }
}

/// Object-storage change notification, already decoded from the platform envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum StorageEvent {
    #[serde(rename_all = "camelCase")]
    Created { bucket: String, key: String, size: i64 },
    #[serde(rename_all = "camelCase")]
    Removed { bucket: String, key: String },
}

impl StorageEvent {
    pub fn bucket(&self) -> &str {
        match self {
            StorageEvent::Created { bucket, .. } | StorageEvent::Removed { bucket, .. } => bucket,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StorageEvent::Created { key, .. } | StorageEvent::Removed { key, .. } => key,
        }
    }
}

/// A listed object in a storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: String,
    pub size: i64,
    pub etag: String,
}

/// ETags come back quoted from most listings; compare them bare.
pub fn normalize_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    pub ingestion_job_id: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<IngestionStatistics>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatistics {
    pub documents_scanned: i64,
    pub documents_indexed: i64,
    pub documents_failed: i64,
}
