use std::sync::Arc;

use crate::config::Settings;
use crate::knowledge_base::MemoryKnowledgeBase;
use crate::model::*;
use crate::pipeline::MemoryPipeline;
use crate::services::Services;
use crate::storage::MemoryObjectStore;
use crate::table::MemoryTable;

/// In-memory services plus typed handles on each backend for assertions.
pub(crate) struct Fixture {
    pub services: Services,
    pub objects: Arc<MemoryObjectStore>,
    pub table: Arc<MemoryTable>,
    pub pipeline: Arc<MemoryPipeline>,
    pub knowledge_base: Arc<MemoryKnowledgeBase>,
}

impl Fixture {
    pub fn new(settings: Settings) -> Self {
        let objects = Arc::new(MemoryObjectStore::new());
        let table = Arc::new(MemoryTable::new());
        let pipeline = Arc::new(MemoryPipeline::new());
        let knowledge_base = Arc::new(MemoryKnowledgeBase::new());
        let services = Services {
            settings: Arc::new(settings),
            objects: objects.clone(),
            table: table.clone(),
            pipeline: pipeline.clone(),
            knowledge_base: knowledge_base.clone(),
        };
        Self {
            services,
            objects,
            table,
            pipeline,
            knowledge_base,
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

pub(crate) fn record(bucket: &str, key: &str, evaluation: EvaluationStatus) -> FileRecord {
    FileRecord {
        s3_location: s3_location(bucket, key),
        file_type: FileType::Processed,
        bucket: bucket.to_string(),
        key: key.to_string(),
        size: 100,
        file_format: "pdf".to_string(),
        has_metadata: false,
        status: FileStatus::Active,
        ingestion_status: IngestionStatus::Pending,
        evaluation_status: evaluation,
        evaluation_timestamp: None,
        last_modified: "2024-05-01T00:00:00Z".to_string(),
    }
}
