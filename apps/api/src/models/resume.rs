use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional side-car data for a résumé, loaded from `<metadata_dir>/<stem>.json`.
/// Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certifications: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded résumé. `file_path` is the stable identity used as the score key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub text: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResumeMetadata>,
}

impl ResumeRecord {
    pub fn metadata_json(&self) -> Option<Value> {
        self.metadata
            .as_ref()
            .and_then(|m| serde_json::to_value(m).ok())
    }
}
