//! One module per pipeline step. Each handler takes the shared [`Services`]
//! and a typed request, and is wired to both the Lambda runtime and the local
//! HTTP gateway.
//!
//! [`Services`]: crate::services::Services

pub mod approval;
pub mod chunker;
pub mod evaluation_gate;
pub mod ingestion;
pub mod metadata_tracker;
pub mod promotion;

#[cfg(test)]
pub(crate) mod fixtures;

pub use approval::{trigger_approval, ApprovalOutcome, ApprovalRequest};
pub use chunker::{run_chunker, ChunkerRequest, ChunkerResponse};
pub use evaluation_gate::{evaluate, EvaluationReport, EvaluationRequest};
pub use ingestion::{ingestion_status, start_ingestion, IngestionStatusRequest, StartIngestionRequest};
pub use metadata_tracker::{handle_events, TrackOutcome};
pub use promotion::{promote, PromotionReport};
