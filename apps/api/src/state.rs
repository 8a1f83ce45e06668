use std::sync::Arc;

use crate::config::Config;
use crate::jobs::registry::JobRegistry;
use crate::scoring::rating::{Rater, RatingPolicy};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable rating backend. Default: `LlmRater` over the Anthropic API.
    pub rater: Arc<dyn Rater>,
    pub rating_policy: RatingPolicy,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(config: Config, rater: Arc<dyn Rater>) -> Self {
        let rating_policy = RatingPolicy {
            timeout: config.rating_timeout,
        };
        Self {
            config,
            rater,
            rating_policy,
            jobs: Arc::new(JobRegistry::new()),
        }
    }
}
