//! RAG Pipeline
//!
//! Event handlers that track document lifecycle for a Retrieval-Augmented-Generation
//! ingestion pipeline: metadata tracking, evaluation gating, QA to production promotion,
//! pipeline approval and knowledge-base ingestion.

pub mod api;
pub mod config;
pub mod handlers;
pub mod knowledge_base;
#[cfg(feature = "aws")]
pub mod lambda;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod record_filter;
pub mod services;
pub mod storage;
pub mod table;

pub use config::Settings;
pub use model::*;
pub use services::Services;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_METADATA_TABLE: &str = "file-metadata";
    pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.8;
    pub const DEFAULT_APPROVAL_STAGE: &str = "QA";
    pub const DEFAULT_APPROVAL_ACTION: &str = "ManualApproval";
    pub const DEFAULT_PROCESSED_MARKER: &str = "processed";
    pub const DEFAULT_CHUNK_WORDS: usize = 1000;
    pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8081";
    pub const SIDECAR_SUFFIX: &str = ".metadata.json";
    pub const CHUNK_OUTPUT_PREFIX: &str = "Output/";
}

/// Error types for the pipeline handlers
pub mod errors {
    use anyhow::Error;

    pub type Result<T> = std::result::Result<T, Error>;

    #[derive(Debug, thiserror::Error)]
    pub enum PipelineError {
        #[error("Invalid event: {0}")]
        InvalidEvent(String),

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("No approval token found for pipeline {pipeline}")]
        ApprovalTokenNotFound { pipeline: String },

        #[error("Batch partially failed: {failed} of {total} writes failed")]
        PartialBatch { failed: usize, total: usize },

        #[error("Storage error: {0}")]
        StorageError(String),
    }
}
