//! Pipeline orchestrator seam: read stage/action state, submit approval decisions.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "aws")]
mod codepipeline;
mod memory;

#[cfg(feature = "aws")]
pub use codepipeline::CodePipelineClient;
pub use memory::MemoryPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    InProgress,
    Succeeded,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub name: String,
    pub status: Option<ActionStatus>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub name: String,
    pub actions: Vec<ActionSnapshot>,
}

/// Point-in-time view of a pipeline execution, stages in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub stages: Vec<StageSnapshot>,
}

impl PipelineState {
    pub fn action(&self, stage: &str, action: &str) -> Option<&ActionSnapshot> {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .and_then(|s| s.actions.iter().find(|a| a.name == action))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One approval submission, addressed to a single stage/action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSubmission {
    pub pipeline: String,
    pub stage: String,
    pub action: String,
    pub token: String,
    pub decision: ApprovalDecision,
    pub summary: String,
}

#[async_trait]
pub trait PipelineControl: Send + Sync {
    async fn get_state(&self, pipeline: &str) -> Result<PipelineState>;

    async fn submit_approval(&self, submission: &ApprovalSubmission) -> Result<()>;
}
