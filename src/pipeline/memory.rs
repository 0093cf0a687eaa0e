use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ApprovalSubmission, PipelineControl, PipelineState};

/// Pipeline states set up front; submissions are recorded rather than applied.
#[derive(Default)]
pub struct MemoryPipeline {
    states: Mutex<HashMap<String, PipelineState>>,
    submissions: Mutex<Vec<ApprovalSubmission>>,
}

impl MemoryPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, pipeline: &str, state: PipelineState) {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.insert(pipeline.to_string(), state);
    }

    pub fn submissions(&self) -> Vec<ApprovalSubmission> {
        match self.submissions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PipelineControl for MemoryPipeline {
    async fn get_state(&self, pipeline: &str) -> Result<PipelineState> {
        let states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // An unknown pipeline reads as one with no stages.
        Ok(states.get(pipeline).cloned().unwrap_or_default())
    }

    async fn submit_approval(&self, submission: &ApprovalSubmission) -> Result<()> {
        tracing::info!(
            "Recorded {:?} for {}/{}/{}",
            submission.decision,
            submission.pipeline,
            submission.stage,
            submission.action
        );
        let mut submissions = match self.submissions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        submissions.push(submission.clone());
        Ok(())
    }
}
