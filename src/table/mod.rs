//! Metadata table holding one FileRecord per tracked object.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{EvaluationStatus, FileRecord, RecordKey};
use crate::record_filter::RecordFilter;

#[cfg(feature = "aws")]
mod dynamo;
mod memory;

#[cfg(feature = "aws")]
pub use dynamo::DynamoTable;
pub use memory::MemoryTable;

/// Result of a conditional single-attribute update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The row exists but its current state made the update inapplicable.
    Skipped,
    /// No row with that key.
    Missing,
}

#[async_trait]
pub trait MetadataTable: Send + Sync {
    /// Insert or fully replace the row for `record`'s composite key.
    async fn put_record(&self, record: &FileRecord) -> Result<()>;

    async fn get_record(&self, key: &RecordKey) -> Result<Option<FileRecord>>;

    /// Flip only the lifecycle status to deleted. Never creates a row.
    async fn mark_deleted(&self, key: &RecordKey) -> Result<UpdateOutcome>;

    /// Stamp an evaluation outcome, applied only while the row is still pending.
    async fn record_evaluation(
        &self,
        key: &RecordKey,
        outcome: EvaluationStatus,
        timestamp: &str,
    ) -> Result<UpdateOutcome>;

    /// Full-table scan, keeping rows that match `filter`.
    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>>;
}
