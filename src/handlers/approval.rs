use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::errors::PipelineError;
use crate::metrics::get_metrics_collector;
use crate::model::Verdict;
use crate::pipeline::{ActionStatus, ApprovalDecision, ApprovalSubmission, PipelineState};
use crate::services::Services;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    /// Decision follows the evaluation verdict.
    Verdict,
    /// A previously succeeded approval was rejected to force re-evaluation.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub decision: ApprovalDecision,
    pub reason: ApprovalReason,
    pub token_source: TokenSource,
    pub stage: String,
    pub action: String,
}

struct Target<'a> {
    stage: &'a str,
    action: &'a str,
    token: &'a str,
    status: Option<ActionStatus>,
    source: TokenSource,
}

/// Find the approval action to act on: the configured stage/action first,
/// then the first in-progress action with a token in pipeline order.
fn locate<'a>(state: &'a PipelineState, settings: &'a Settings) -> Option<Target<'a>> {
    if let Some(action) = state.action(&settings.approval_stage, &settings.approval_action) {
        if let Some(token) = action.token.as_deref() {
            return Some(Target {
                stage: &settings.approval_stage,
                action: &settings.approval_action,
                token,
                status: action.status,
                source: TokenSource::Primary,
            });
        }
    }

    tracing::warn!(
        "No token on {}/{}; scanning all stages",
        settings.approval_stage,
        settings.approval_action
    );
    state.stages.iter().find_map(|stage| {
        stage.actions.iter().find_map(|action| match (&action.status, action.token.as_deref()) {
            (Some(ActionStatus::InProgress), Some(token)) => Some(Target {
                stage: &stage.name,
                action: &action.name,
                token,
                status: action.status,
                source: TokenSource::Fallback,
            }),
            _ => None,
        })
    })
}

pub async fn trigger_approval(services: &Services, request: &ApprovalRequest) -> Result<ApprovalOutcome> {
    let _measurement = crate::measure_operation!("approval.trigger");
    let settings = &services.settings;
    let pipeline = Settings::require(&settings.pipeline_name, "PIPELINE_NAME")?;

    let state = services.pipeline.get_state(pipeline).await?;
    let target = locate(&state, settings).ok_or_else(|| PipelineError::ApprovalTokenNotFound {
        pipeline: pipeline.to_string(),
    })?;

    let (decision, reason, summary) = if target.status == Some(ActionStatus::Succeeded) {
        (
            ApprovalDecision::Rejected,
            ApprovalReason::Reset,
            "Resetting previous approval: new data requires re-evaluation".to_string(),
        )
    } else {
        match request.verdict {
            Verdict::Passed => (
                ApprovalDecision::Approved,
                ApprovalReason::Verdict,
                "Evaluation passed".to_string(),
            ),
            Verdict::Failed => (
                ApprovalDecision::Rejected,
                ApprovalReason::Verdict,
                "Evaluation failed".to_string(),
            ),
        }
    };

    let submission = ApprovalSubmission {
        pipeline: pipeline.to_string(),
        stage: target.stage.to_string(),
        action: target.action.to_string(),
        token: target.token.to_string(),
        decision,
        summary,
    };
    services.pipeline.submit_approval(&submission).await?;

    tracing::info!(
        "Submitted {:?} on {}/{}/{} ({:?}, token from {:?} lookup)",
        decision,
        pipeline,
        submission.stage,
        submission.action,
        reason,
        target.source
    );
    get_metrics_collector().track_metric("approval.submitted", 1.0);

    Ok(ApprovalOutcome {
        decision,
        reason,
        token_source: target.source,
        stage: submission.stage,
        action: submission.action,
    })
}
