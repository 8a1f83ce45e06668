use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::resume::ResumeRecord;

/// Well-known `PipelineState.metadata` keys.
pub mod keys {
    // Inputs
    pub const JD_PATH: &str = "jd_path";
    pub const RESUME_FOLDER: &str = "resume_folder";
    pub const METADATA_FOLDER: &str = "metadata_folder";
    pub const OUTPUT_DIR: &str = "output_dir";
    pub const SCORE_THRESHOLD: &str = "score_threshold";

    // Outputs
    pub const PARSED_JD: &str = "parsed_jd";
    pub const INGEST_ERRORS: &str = "ingest_errors";
    pub const SCORING_RESULTS: &str = "scoring_results";
    pub const QUALIFIED_COUNT: &str = "qualified_count";
    pub const TOTAL_COUNT: &str = "total_count";
    pub const THRESHOLD: &str = "threshold";
}

/// The record threaded through the three stages. Each stage replaces only its own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub jd_content: Option<String>,
    pub resumes: Vec<ResumeRecord>,
    /// `file_path → score`, in résumé order.
    pub scores: IndexMap<String, f64>,
    pub metadata: Map<String, Value>,
}

impl PipelineState {
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// A non-blank string value under `key`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
