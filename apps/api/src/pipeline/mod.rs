//! Pipeline: `parse_jd → process_resumes → score_and_move`, strictly in that order.
//!
//! No branching, no retries, no cycles. A stage that cannot run leaves its own fields empty and
//! reports a `StageFailure`; the next stage still runs on the state it was handed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scoring::rating::{Rater, RatingPolicy};

pub mod stages;
pub mod state;

pub use stages::{ParseJdStage, ProcessResumesStage, ScoreAndMoveStage, Stage, StageError};
pub use state::{keys, PipelineState};

/// A stage's recoverable error, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub failures: Vec<StageFailure>,
}

pub struct Pipeline {
    stages: [Box<dyn Stage>; 3],
}

impl Pipeline {
    pub fn new(rater: Arc<dyn Rater>, policy: RatingPolicy) -> Self {
        Self {
            stages: [
                Box::new(ParseJdStage),
                Box::new(ProcessResumesStage),
                Box::new(ScoreAndMoveStage::new(rater, policy)),
            ],
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut state: PipelineState) -> PipelineReport {
        let mut failures = Vec::new();
        for stage in &self.stages {
            info!(stage = stage.name(), "pipeline stage started");
            let (next, error) = stage.run(state).await;
            state = next;
            if let Some(e) = error {
                warn!(stage = stage.name(), error = %e, "pipeline stage could not complete");
                failures.push(StageFailure {
                    stage: stage.name().to_string(),
                    message: e.to_string(),
                });
            }
        }
        info!(
            resumes = state.resumes.len(),
            scored = state.scores.len(),
            failures = failures.len(),
            "pipeline finished"
        );
        PipelineReport { state, failures }
    }
}
