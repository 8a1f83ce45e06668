//! The rating capability seam.
//!
//! `QualificationCoordinator` holds an `Arc<dyn Rater>` injected at construction, so the
//! backend can be swapped (or faked in tests) without touching the coordinator.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm_client::{LlmClient, LlmError};
use crate::scoring::prompts::rating_system_prompt;

pub const DEFAULT_RATING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("rating timed out after {0:?}")]
    TimedOut(Duration),

    #[error("rating failed: {0}")]
    Failed(String),
}

/// Black box that judges résumé/job fit and answers with free text.
#[async_trait]
pub trait Rater: Send + Sync {
    async fn rate(&self, prompt: &str) -> Result<String, RatingError>;
}

/// How the coordinator bounds each call to the rater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingPolicy {
    pub timeout: Duration,
}

impl Default for RatingPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RATING_TIMEOUT,
        }
    }
}

/// Rater backed by Claude through `LlmClient`.
pub struct LlmRater {
    llm: LlmClient,
    system: String,
}

impl LlmRater {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            system: rating_system_prompt(),
        }
    }
}

#[async_trait]
impl Rater for LlmRater {
    async fn rate(&self, prompt: &str) -> Result<String, RatingError> {
        Ok(self.llm.complete(prompt, &self.system).await?)
    }
}
