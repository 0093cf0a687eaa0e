use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{MetadataTable, UpdateOutcome};
use crate::model::{EvaluationStatus, FileRecord, FileStatus, RecordKey};
use crate::record_filter::RecordFilter;

type Rows = BTreeMap<(String, &'static str), FileRecord>;

#[derive(Default)]
pub struct MemoryTable {
    rows: Mutex<Rows>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Rows> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn row_key(key: &RecordKey) -> (String, &'static str) {
        (key.s3_location.clone(), key.file_type.as_str())
    }
}

#[async_trait]
impl MetadataTable for MemoryTable {
    async fn put_record(&self, record: &FileRecord) -> Result<()> {
        self.lock().insert(Self::row_key(&record.record_key()), record.clone());
        Ok(())
    }

    async fn get_record(&self, key: &RecordKey) -> Result<Option<FileRecord>> {
        Ok(self.lock().get(&Self::row_key(key)).cloned())
    }

    async fn mark_deleted(&self, key: &RecordKey) -> Result<UpdateOutcome> {
        match self.lock().get_mut(&Self::row_key(key)) {
            Some(record) => {
                record.status = FileStatus::Deleted;
                Ok(UpdateOutcome::Updated)
            }
            None => Ok(UpdateOutcome::Missing),
        }
    }

    async fn record_evaluation(
        &self,
        key: &RecordKey,
        outcome: EvaluationStatus,
        timestamp: &str,
    ) -> Result<UpdateOutcome> {
        match self.lock().get_mut(&Self::row_key(key)) {
            Some(record) if record.evaluation_status == EvaluationStatus::Pending => {
                record.evaluation_status = outcome;
                record.evaluation_timestamp = Some(timestamp.to_string());
                Ok(UpdateOutcome::Updated)
            }
            Some(_) => Ok(UpdateOutcome::Skipped),
            None => Ok(UpdateOutcome::Missing),
        }
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>> {
        Ok(self
            .lock()
            .values()
            .filter(|record| filter.matches_record(record))
            .cloned()
            .collect())
    }
}
