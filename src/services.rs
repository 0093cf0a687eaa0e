use std::sync::Arc;

use crate::config::Settings;
use crate::knowledge_base::{KnowledgeBase, MemoryKnowledgeBase};
use crate::pipeline::{MemoryPipeline, PipelineControl};
use crate::storage::{MemoryObjectStore, ObjectStore};
use crate::table::{MemoryTable, MetadataTable};

/// Backends every handler draws from. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub settings: Arc<Settings>,
    pub objects: Arc<dyn ObjectStore>,
    pub table: Arc<dyn MetadataTable>,
    pub pipeline: Arc<dyn PipelineControl>,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
}

impl Services {
    /// In-memory backends, for local dry runs of the gateway.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            objects: Arc::new(MemoryObjectStore::new()),
            table: Arc::new(MemoryTable::new()),
            pipeline: Arc::new(MemoryPipeline::new()),
            knowledge_base: Arc::new(MemoryKnowledgeBase::new()),
        }
    }

    #[cfg(feature = "aws")]
    pub async fn from_aws(settings: Settings) -> Self {
        use aws_config::{meta::region::RegionProviderChain, BehaviorVersion};

        use crate::knowledge_base::BedrockKnowledgeBase;
        use crate::pipeline::CodePipelineClient;
        use crate::storage::S3Client;
        use crate::table::DynamoTable;

        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        tracing::info!(
            "AWS clients ready - table: {}, region: {:?}",
            settings.metadata_table,
            config.region()
        );

        Self {
            objects: Arc::new(S3Client::new(&config, settings.endpoint_url.as_deref())),
            table: Arc::new(DynamoTable::new(&config, settings.metadata_table.clone())),
            pipeline: Arc::new(CodePipelineClient::new(&config)),
            knowledge_base: Arc::new(BedrockKnowledgeBase::new(&config)),
            settings: Arc::new(settings),
        }
    }
}
