//! The three pipeline stages. Each takes the full state and hands back the full state with only
//! its own fields replaced, plus an optional error describing a missing or unusable input.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::extraction::parse_job_description;
use crate::ingest::documents::{list_documents, read_document_text, DocumentError};
use crate::ingest::metadata::find_metadata;
use crate::models::job_description::{JobDescriptionRecord, ParseMode};
use crate::models::resume::{ResumeMetadata, ResumeRecord};
use crate::pipeline::state::{keys, PipelineState};
use crate::scoring::placement::{FilesystemPlacement, Placement};
use crate::scoring::rating::{Rater, RatingPolicy};
use crate::scoring::{JobContext, QualificationCoordinator, Threshold};

pub const DEFAULT_OUTPUT_DIR: &str = "filtered_resumes";

#[derive(Debug, Error)]
pub enum StageError {
    #[error("no job description: neither jd_content nor {} was provided", keys::JD_PATH)]
    MissingJobDescription,

    #[error("job description could not be read: {0}")]
    JobDescription(#[source] DocumentError),

    #[error("no resumes: {} was not provided", keys::RESUME_FOLDER)]
    MissingResumeFolder,

    #[error("resume folder could not be read: {0}")]
    ResumeFolder(#[source] DocumentError),

    #[error("cannot score: missing {0}")]
    MissingScoringInputs(&'static str),
}

/// `(state) -> (state, error?)`. Stages never fail past this boundary.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: PipelineState) -> (PipelineState, Option<StageError>);
}

// ────────────────────────────────────────────────────────────────────────────
// parse_jd
// ────────────────────────────────────────────────────────────────────────────

/// Produces `jd_content` and `metadata.parsed_jd`.
pub struct ParseJdStage;

impl ParseJdStage {
    async fn load(state: &PipelineState) -> Result<String, StageError> {
        if let Some(content) = state.jd_content.as_deref().filter(|c| !c.trim().is_empty()) {
            return Ok(content.to_string());
        }
        let path = state
            .metadata_str(keys::JD_PATH)
            .ok_or(StageError::MissingJobDescription)?;
        read_document_text(Path::new(path))
            .await
            .map_err(StageError::JobDescription)
    }
}

#[async_trait]
impl Stage for ParseJdStage {
    fn name(&self) -> &'static str {
        "parse_jd"
    }

    async fn run(&self, mut state: PipelineState) -> (PipelineState, Option<StageError>) {
        let content = match Self::load(&state).await {
            Ok(content) => content,
            Err(e) => {
                state.jd_content = None;
                state.metadata.remove(keys::PARSED_JD);
                return (state, Some(e));
            }
        };

        let record = parse_job_description(&content, ParseMode::Full);
        info!(title = %record.title, skills = record.skills.len(), "job description parsed");
        match serde_json::to_value(&record) {
            Ok(value) => {
                state.metadata.insert(keys::PARSED_JD.to_string(), value);
            }
            Err(e) => warn!(error = %e, "could not serialize parsed job description"),
        }
        state.jd_content = Some(content);
        (state, None)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// process_resumes
// ────────────────────────────────────────────────────────────────────────────

/// Produces `resumes` (file-name order) and `metadata.ingest_errors`.
/// Résumés already present in the state are kept when no folder is configured.
pub struct ProcessResumesStage;

impl ProcessResumesStage {
    async fn lookup_metadata(path: &Path, metadata_dir: Option<&Path>) -> Option<ResumeMetadata> {
        let dir = metadata_dir?;
        let stem = path.file_stem()?.to_str()?;
        match find_metadata(stem, dir).await {
            Ok(found) => found,
            Err(e) => {
                warn!(file_path = %path.display(), error = %e, "ignoring unreadable resume metadata");
                None
            }
        }
    }

    async fn ingest(
        folder: &Path,
        metadata_dir: Option<&Path>,
    ) -> Result<(Vec<ResumeRecord>, Vec<Value>), StageError> {
        let documents = list_documents(folder)
            .await
            .map_err(StageError::ResumeFolder)?;

        let mut resumes = Vec::with_capacity(documents.len());
        let mut errors = Vec::new();
        for path in documents {
            let text = match read_document_text(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(file_path = %path.display(), error = %e, "skipping undecodable resume");
                    errors.push(json!({
                        "file_path": path.to_string_lossy(),
                        "error": e.to_string(),
                    }));
                    continue;
                }
            };
            let metadata = Self::lookup_metadata(&path, metadata_dir).await;
            resumes.push(ResumeRecord {
                text,
                file_path: path.to_string_lossy().into_owned(),
                metadata,
            });
        }
        Ok((resumes, errors))
    }
}

#[async_trait]
impl Stage for ProcessResumesStage {
    fn name(&self) -> &'static str {
        "process_resumes"
    }

    async fn run(&self, mut state: PipelineState) -> (PipelineState, Option<StageError>) {
        let Some(folder) = state.metadata_str(keys::RESUME_FOLDER).map(PathBuf::from) else {
            if state.resumes.is_empty() {
                return (state, Some(StageError::MissingResumeFolder));
            }
            return (state, None);
        };
        let metadata_dir = state.metadata_str(keys::METADATA_FOLDER).map(PathBuf::from);

        match Self::ingest(&folder, metadata_dir.as_deref()).await {
            Ok((resumes, errors)) => {
                info!(count = resumes.len(), skipped = errors.len(), "resumes ingested");
                state.resumes = resumes;
                state
                    .metadata
                    .insert(keys::INGEST_ERRORS.to_string(), Value::Array(errors));
                (state, None)
            }
            Err(e) => {
                state.resumes = Vec::new();
                (state, Some(e))
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// score_and_move
// ────────────────────────────────────────────────────────────────────────────

/// Produces `scores` and the scoring audit keys in `metadata`.
pub struct ScoreAndMoveStage {
    rater: Arc<dyn Rater>,
    policy: RatingPolicy,
    placement: Option<Arc<dyn Placement>>,
}

impl ScoreAndMoveStage {
    pub fn new(rater: Arc<dyn Rater>, policy: RatingPolicy) -> Self {
        Self {
            rater,
            policy,
            placement: None,
        }
    }

    /// Replaces the filesystem placement derived from `metadata.output_dir`.
    pub fn with_placement(mut self, placement: Arc<dyn Placement>) -> Self {
        self.placement = Some(placement);
        self
    }

    fn placement_for(&self, state: &PipelineState) -> Arc<dyn Placement> {
        if let Some(placement) = &self.placement {
            return placement.clone();
        }
        let output_dir = state.metadata_str(keys::OUTPUT_DIR).unwrap_or(DEFAULT_OUTPUT_DIR);
        Arc::new(FilesystemPlacement::new(output_dir, true))
    }
}

#[async_trait]
impl Stage for ScoreAndMoveStage {
    fn name(&self) -> &'static str {
        "score_and_move"
    }

    async fn run(&self, mut state: PipelineState) -> (PipelineState, Option<StageError>) {
        let missing = match (state.jd_content.is_some(), state.resumes.is_empty()) {
            (false, true) => Some("job description and resumes"),
            (false, false) => Some("job description"),
            (true, true) => Some("resumes"),
            (true, false) => None,
        };
        if let Some(missing) = missing {
            state.scores.clear();
            return (state, Some(StageError::MissingScoringInputs(missing)));
        }

        let threshold = Threshold::from_value(state.metadata.get(keys::SCORE_THRESHOLD));
        let record = state
            .metadata
            .get(keys::PARSED_JD)
            .and_then(|v| serde_json::from_value::<JobDescriptionRecord>(v.clone()).ok());
        let job = JobContext {
            raw_text: state.jd_content.clone().unwrap_or_default(),
            record,
        };

        let coordinator = QualificationCoordinator::new(
            self.rater.clone(),
            self.placement_for(&state),
            self.policy,
            threshold,
        );
        let report = coordinator.run(&job, &state.resumes).await;

        let results = serde_json::to_value(&report.results).unwrap_or_else(|e| {
            warn!(error = %e, "could not serialize scoring results");
            Value::Array(Vec::new())
        });
        state.metadata.insert(keys::SCORING_RESULTS.to_string(), results);
        state
            .metadata
            .insert(keys::QUALIFIED_COUNT.to_string(), json!(report.qualified_count));
        state
            .metadata
            .insert(keys::TOTAL_COUNT.to_string(), json!(report.total_count()));
        state
            .metadata
            .insert(keys::THRESHOLD.to_string(), json!(report.threshold));
        state.scores = report.scores;
        (state, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::placement::PlacementError;
    use crate::scoring::rating::RatingError;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::fs;

    struct FixedRater(&'static str);

    #[async_trait]
    impl Rater for FixedRater {
        async fn rate(&self, _prompt: &str) -> Result<String, RatingError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct RecordingPlacement(Mutex<Vec<PathBuf>>);

    #[async_trait]
    impl Placement for RecordingPlacement {
        async fn place(&self, source: &Path, _score: f64) -> Result<PathBuf, PlacementError> {
            self.0.lock().unwrap().push(source.to_path_buf());
            Ok(source.to_path_buf())
        }
    }

    const JD: &str = "JOB TITLE: Senior Backend Engineer\n\
                      KEY RESPONSIBILITIES:\n\
                      - Design APIs\n\
                      - Mentor engineers\n";

    #[tokio::test]
    async fn test_parse_jd_uses_existing_content() {
        let state = PipelineState {
            jd_content: Some(JD.to_string()),
            ..Default::default()
        };
        let (state, err) = ParseJdStage.run(state).await;
        assert!(err.is_none());
        assert_eq!(state.jd_content.as_deref(), Some(JD));
        assert_eq!(
            state.metadata[keys::PARSED_JD]["title"],
            "Senior Backend Engineer"
        );
    }

    #[tokio::test]
    async fn test_parse_jd_reads_file_and_reports_missing_input() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jd.md");
        fs::write(&path, JD).await.unwrap();

        let state = PipelineState::default().with_metadata(keys::JD_PATH, path.to_str().unwrap());
        let (state, err) = ParseJdStage.run(state).await;
        assert!(err.is_none());
        assert_eq!(state.jd_content.as_deref(), Some(JD));

        let (state, err) = ParseJdStage.run(PipelineState::default()).await;
        assert!(matches!(err, Some(StageError::MissingJobDescription)));
        assert_eq!(state, PipelineState::default());
    }

    #[tokio::test]
    async fn test_jd_content_survives_process_resumes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("r1.txt"), "Rust resume").await.unwrap();

        let state = PipelineState {
            jd_content: Some(JD.to_string()),
            ..Default::default()
        }
        .with_metadata(keys::RESUME_FOLDER, tmp.path().to_str().unwrap());

        let (state, _) = ParseJdStage.run(state).await;
        let jd_after_parse = state.jd_content.clone();
        let parsed_after_parse = state.metadata[keys::PARSED_JD].clone();

        let (state, err) = ProcessResumesStage.run(state).await;
        assert!(err.is_none());
        assert_eq!(state.jd_content, jd_after_parse);
        assert_eq!(state.metadata[keys::PARSED_JD], parsed_after_parse);
        assert_eq!(state.resumes.len(), 1);
    }

    #[tokio::test]
    async fn test_process_resumes_attaches_metadata_and_records_skips() {
        let tmp = TempDir::new().unwrap();
        let resumes = tmp.path().join("resumes");
        let meta = tmp.path().join("meta");
        fs::create_dir_all(&resumes).await.unwrap();
        fs::create_dir_all(&meta).await.unwrap();
        fs::write(resumes.join("b.txt"), "Bob").await.unwrap();
        fs::write(resumes.join("a.md"), "Alice").await.unwrap();
        fs::write(resumes.join("c.txt"), "   ").await.unwrap();
        fs::write(meta.join("a.json"), r#"{"certifications": ["CKA"]}"#)
            .await
            .unwrap();

        let state = PipelineState::default()
            .with_metadata(keys::RESUME_FOLDER, resumes.to_str().unwrap())
            .with_metadata(keys::METADATA_FOLDER, meta.to_str().unwrap());
        let (state, err) = ProcessResumesStage.run(state).await;

        assert!(err.is_none());
        let texts: Vec<_> = state.resumes.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["Alice", "Bob"]);
        assert_eq!(
            state.resumes[0].metadata.as_ref().unwrap().certifications,
            Some(vec!["CKA".to_string()])
        );
        assert!(state.resumes[1].metadata.is_none());
        assert_eq!(state.metadata[keys::INGEST_ERRORS].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_process_resumes_missing_folder() {
        let state = PipelineState {
            jd_content: Some(JD.to_string()),
            ..Default::default()
        };
        let (state, err) = ProcessResumesStage.run(state).await;
        assert!(matches!(err, Some(StageError::MissingResumeFolder)));
        assert!(state.resumes.is_empty());
        assert_eq!(state.jd_content.as_deref(), Some(JD));
    }

    #[tokio::test]
    async fn test_score_and_move_short_circuits_without_inputs() {
        let stage = ScoreAndMoveStage::new(Arc::new(FixedRater("Score: 90/100")), RatingPolicy::default());
        let mut state = PipelineState::default().with_metadata("keep", true);
        state.scores.insert("stale.pdf".to_string(), 50.0);

        let (state, err) = stage.run(state).await;
        assert!(matches!(
            err,
            Some(StageError::MissingScoringInputs("job description and resumes"))
        ));
        assert!(state.scores.is_empty());
        assert_eq!(state.metadata["keep"], true);
    }

    #[tokio::test]
    async fn test_score_and_move_writes_audit_metadata() {
        let placement = Arc::new(RecordingPlacement::default());
        let stage = ScoreAndMoveStage::new(Arc::new(FixedRater("Score: 90/100")), RatingPolicy::default())
            .with_placement(placement.clone());
        let state = PipelineState {
            jd_content: Some(JD.to_string()),
            resumes: vec![ResumeRecord {
                text: "resume".to_string(),
                file_path: "r1.pdf".to_string(),
                metadata: None,
            }],
            ..Default::default()
        }
        .with_metadata(keys::SCORE_THRESHOLD, "85");

        let (state, err) = stage.run(state).await;
        assert!(err.is_none());
        assert_eq!(state.scores["r1.pdf"], 90.0);
        assert_eq!(state.metadata[keys::QUALIFIED_COUNT], 1);
        assert_eq!(state.metadata[keys::TOTAL_COUNT], 1);
        assert_eq!(state.metadata[keys::THRESHOLD], 85.0);
        assert_eq!(state.metadata[keys::SCORING_RESULTS][0]["file_path"], "r1.pdf");
        assert_eq!(placement.0.lock().unwrap().len(), 1);
    }
}
