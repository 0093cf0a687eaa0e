use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_codepipeline::{
    types::{ActionExecutionStatus, ApprovalResult, ApprovalStatus},
    Client,
};

use super::{
    ActionSnapshot, ActionStatus, ApprovalDecision, ApprovalSubmission, PipelineControl,
    PipelineState, StageSnapshot,
};

#[derive(Clone)]
pub struct CodePipelineClient {
    client: Client,
}

impl CodePipelineClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn action_status(status: &ActionExecutionStatus) -> Option<ActionStatus> {
    match status {
        ActionExecutionStatus::InProgress => Some(ActionStatus::InProgress),
        ActionExecutionStatus::Succeeded => Some(ActionStatus::Succeeded),
        ActionExecutionStatus::Failed => Some(ActionStatus::Failed),
        ActionExecutionStatus::Abandoned => Some(ActionStatus::Abandoned),
        other => {
            tracing::warn!("Unrecognised action execution status: {}", other.as_str());
            None
        }
    }
}

#[async_trait]
impl PipelineControl for CodePipelineClient {
    async fn get_state(&self, pipeline: &str) -> Result<PipelineState> {
        let response = self
            .client
            .get_pipeline_state()
            .name(pipeline)
            .send()
            .await
            .with_context(|| format!("Failed to get state for pipeline {}", pipeline))?;

        let stages = response
            .stage_states()
            .iter()
            .map(|stage| StageSnapshot {
                name: stage.stage_name().unwrap_or_default().to_string(),
                actions: stage
                    .action_states()
                    .iter()
                    .map(|action| {
                        let execution = action.latest_execution();
                        ActionSnapshot {
                            name: action.action_name().unwrap_or_default().to_string(),
                            status: execution.and_then(|e| e.status()).and_then(action_status),
                            token: execution.and_then(|e| e.token()).map(str::to_string),
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(PipelineState { stages })
    }

    async fn submit_approval(&self, submission: &ApprovalSubmission) -> Result<()> {
        let status = match submission.decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
        };
        let result = ApprovalResult::builder()
            .summary(&submission.summary)
            .status(status)
            .build()
            .context("Failed to build approval result")?;

        self.client
            .put_approval_result()
            .pipeline_name(&submission.pipeline)
            .stage_name(&submission.stage)
            .action_name(&submission.action)
            .token(&submission.token)
            .result(result)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to submit approval for {}/{}/{}",
                    submission.pipeline, submission.stage, submission.action
                )
            })?;
        Ok(())
    }
}
