//! Qualification Coordinator: rates each résumé against the job, parses the score, and
//! places the ones above the threshold.
//!
//! Per résumé: `scoring → decided → placed | skipped`; per batch: `aggregated`.
//! The rater and the placement backend are injected as trait objects. Failures of either are
//! recorded on the résumé's entry and never abort the batch.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::job_description::JobDescriptionRecord;
use crate::models::resume::ResumeRecord;
use crate::scoring::placement::Placement;
use crate::scoring::prompts::build_rating_prompt;
use crate::scoring::rating::{Rater, RatingError, RatingPolicy};
use crate::scoring::score_parser::{parse_score, MAX_SCORE, MIN_SCORE};

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// The job side of a rating request: raw JD text plus its parsed record, when available.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    pub raw_text: String,
    pub record: Option<JobDescriptionRecord>,
}

/// Qualification cut-off. A résumé qualifies when `score > threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub const DEFAULT: f64 = 75.0;

    /// Accepts a number or numeric string in `[0, 100]`; anything else yields the default.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) => Self::from_f64(v),
            None => {
                warn!(threshold = %value, "non-numeric score threshold, using default {}", Self::DEFAULT);
                Self::default()
            }
        }
    }

    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&value) {
            Self(value)
        } else {
            warn!(threshold = value, "score threshold out of range, using default {}", Self::DEFAULT);
            Self::default()
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn qualifies(self, score: f64) -> bool {
        score > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Recoverable problem attached to one résumé's audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringIssue {
    Rating { message: String },
    Placement { message: String },
}

/// Audit entry for one résumé, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub file_path: String,
    pub score: f64,
    pub metadata: Option<Value>,
    pub qualified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScoringIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualificationReport {
    /// `file_path → score`, in input order.
    pub scores: IndexMap<String, f64>,
    pub results: Vec<ScoringResult>,
    pub qualified_count: usize,
    pub threshold: f64,
}

impl QualificationReport {
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Coordinator
// ────────────────────────────────────────────────────────────────────────────

pub struct QualificationCoordinator {
    rater: Arc<dyn Rater>,
    placement: Arc<dyn Placement>,
    policy: RatingPolicy,
    threshold: Threshold,
}

impl QualificationCoordinator {
    pub fn new(
        rater: Arc<dyn Rater>,
        placement: Arc<dyn Placement>,
        policy: RatingPolicy,
        threshold: Threshold,
    ) -> Self {
        Self {
            rater,
            placement,
            policy,
            threshold,
        }
    }

    /// Scores the batch one résumé at a time, in input order.
    pub async fn run(&self, job: &JobContext, resumes: &[ResumeRecord]) -> QualificationReport {
        let mut report = QualificationReport {
            threshold: self.threshold.value(),
            ..Default::default()
        };

        for resume in resumes {
            let result = self.score_one(job, resume).await;
            if result.qualified {
                report.qualified_count += 1;
            }
            report.scores.insert(result.file_path.clone(), result.score);
            report.results.push(result);
        }

        info!(
            total = report.total_count(),
            qualified = report.qualified_count,
            errors = report.error_count(),
            threshold = report.threshold,
            "qualification batch complete"
        );
        report
    }

    async fn score_one(&self, job: &JobContext, resume: &ResumeRecord) -> ScoringResult {
        let prompt = build_rating_prompt(job, resume);

        let (score, mut error) = match self.rate(&prompt).await {
            Ok(text) => (parse_score(&text), None),
            Err(e) => {
                warn!(file_path = %resume.file_path, error = %e, "rating failed, scoring 0");
                (MIN_SCORE, Some(ScoringIssue::Rating { message: e.to_string() }))
            }
        };

        let qualified = self.threshold.qualifies(score);
        let mut destination = None;
        if qualified {
            match self.placement.place(Path::new(&resume.file_path), score).await {
                Ok(path) => {
                    info!(file_path = %resume.file_path, score, destination = %path.display(), "resume qualified");
                    destination = Some(path.to_string_lossy().into_owned());
                }
                Err(e) => {
                    warn!(file_path = %resume.file_path, score, error = %e, "placement failed");
                    error = Some(ScoringIssue::Placement { message: e.to_string() });
                }
            }
        }

        ScoringResult {
            file_path: resume.file_path.clone(),
            score,
            metadata: resume.metadata_json(),
            qualified,
            destination,
            error,
        }
    }

    async fn rate(&self, prompt: &str) -> Result<String, RatingError> {
        match tokio::time::timeout(self.policy.timeout, self.rater.rate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(RatingError::TimedOut(self.policy.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::scoring::placement::{placement_file_name, PlacementError};

    /// Answers based on which résumé text appears in the prompt.
    struct ScriptedRater {
        replies: HashMap<&'static str, Result<&'static str, &'static str>>,
    }

    #[async_trait]
    impl Rater for ScriptedRater {
        async fn rate(&self, prompt: &str) -> Result<String, RatingError> {
            for (needle, reply) in &self.replies {
                if prompt.contains(needle) {
                    return match reply {
                        Ok(text) => Ok(text.to_string()),
                        Err(msg) => Err(RatingError::Failed(msg.to_string())),
                    };
                }
            }
            Err(RatingError::Failed("unscripted prompt".to_string()))
        }
    }

    struct SlowRater;

    #[async_trait]
    impl Rater for SlowRater {
        async fn rate(&self, _prompt: &str) -> Result<String, RatingError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("Score: 99/100".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingPlacement {
        calls: Mutex<Vec<(PathBuf, f64)>>,
        fail: bool,
    }

    #[async_trait]
    impl Placement for RecordingPlacement {
        async fn place(&self, source: &Path, score: f64) -> Result<PathBuf, PlacementError> {
            self.calls.lock().unwrap().push((source.to_path_buf(), score));
            if self.fail {
                return Err(PlacementError::SourceMissing(source.to_path_buf()));
            }
            let name = source.file_name().unwrap().to_str().unwrap();
            Ok(PathBuf::from("out").join(placement_file_name(score, name)))
        }
    }

    fn resume(path: &str, text: &str) -> ResumeRecord {
        ResumeRecord {
            text: text.to_string(),
            file_path: path.to_string(),
            metadata: None,
        }
    }

    fn job() -> JobContext {
        JobContext {
            raw_text: "Senior Backend Engineer\nKEY RESPONSIBILITIES:\n- Build APIs".to_string(),
            record: None,
        }
    }

    fn coordinator(
        rater: impl Rater + 'static,
        placement: Arc<RecordingPlacement>,
        threshold: f64,
    ) -> QualificationCoordinator {
        QualificationCoordinator::new(
            Arc::new(rater),
            placement,
            RatingPolicy::default(),
            Threshold::from_f64(threshold),
        )
    }

    #[tokio::test]
    async fn test_two_resumes_one_qualifies() {
        let rater = ScriptedRater {
            replies: HashMap::from([
                ("resume one", Ok("Score: 80/100")),
                ("resume two", Ok("Score: 60/100")),
            ]),
        };
        let placement = Arc::new(RecordingPlacement::default());
        let coord = coordinator(rater, placement.clone(), 75.0);

        let report = coord
            .run(&job(), &[resume("r1.pdf", "resume one"), resume("r2.pdf", "resume two")])
            .await;

        assert_eq!(
            report.scores,
            IndexMap::from([("r1.pdf".to_string(), 80.0), ("r2.pdf".to_string(), 60.0)])
        );
        assert_eq!(report.qualified_count, 1);

        let calls = placement.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (PathBuf::from("r1.pdf"), 80.0));
        assert_eq!(
            report.results[0].destination.as_deref(),
            Some(Path::new("out").join("80_0_r1.pdf").to_str().unwrap())
        );
        assert!(!report.results[1].qualified);
        assert_eq!(report.results[1].destination, None);
    }

    #[tokio::test]
    async fn test_rating_failure_does_not_abort_batch() {
        let rater = ScriptedRater {
            replies: HashMap::from([
                ("alpha", Ok("Score: 90/100")),
                ("beta", Err("connection reset")),
                ("gamma", Ok("Final Score: 40")),
            ]),
        };
        let placement = Arc::new(RecordingPlacement::default());
        let coord = coordinator(rater, placement, 75.0);

        let report = coord
            .run(
                &job(),
                &[resume("a.pdf", "alpha"), resume("b.pdf", "beta"), resume("c.pdf", "gamma")],
            )
            .await;

        let order: Vec<_> = report.results.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(order, ["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(report.scores["a.pdf"], 90.0);
        assert_eq!(report.scores["b.pdf"], 0.0);
        assert_eq!(report.scores["c.pdf"], 40.0);
        assert_eq!(report.error_count(), 1);
        assert!(matches!(
            report.results[1].error,
            Some(ScoringIssue::Rating { .. })
        ));
    }

    #[tokio::test]
    async fn test_scores_keep_input_order() {
        let rater = ScriptedRater {
            replies: HashMap::from([
                ("zulu", Ok("Score: 10/100")),
                ("alpha", Ok("Score: 20/100")),
            ]),
        };
        let coord = coordinator(rater, Arc::new(RecordingPlacement::default()), 75.0);

        let report = coord
            .run(&job(), &[resume("z.pdf", "zulu"), resume("a.pdf", "alpha")])
            .await;

        let keys: Vec<_> = report.scores.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z.pdf", "a.pdf"]);
        assert_eq!(
            serde_json::to_string(&report.scores).unwrap(),
            r#"{"z.pdf":10.0,"a.pdf":20.0}"#
        );
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let rater = ScriptedRater {
            replies: HashMap::from([("edge", Ok("Score: 75/100"))]),
        };
        let placement = Arc::new(RecordingPlacement::default());
        let coord = coordinator(rater, placement.clone(), 75.0);

        let report = coord.run(&job(), &[resume("e.pdf", "edge")]).await;

        assert_eq!(report.qualified_count, 0);
        assert!(placement.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_placement_failure_keeps_score() {
        let rater = ScriptedRater {
            replies: HashMap::from([("strong", Ok("Score: 95/100"))]),
        };
        let placement = Arc::new(RecordingPlacement {
            fail: true,
            ..Default::default()
        });
        let coord = coordinator(rater, placement, 75.0);

        let report = coord.run(&job(), &[resume("s.pdf", "strong")]).await;

        assert_eq!(report.scores["s.pdf"], 95.0);
        assert_eq!(report.qualified_count, 1);
        assert!(matches!(
            report.results[0].error,
            Some(ScoringIssue::Placement { .. })
        ));
        assert_eq!(report.results[0].destination, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rating_timeout_scores_zero() {
        let placement = Arc::new(RecordingPlacement::default());
        let coord = QualificationCoordinator::new(
            Arc::new(SlowRater),
            placement.clone(),
            RatingPolicy {
                timeout: Duration::from_secs(5),
            },
            Threshold::default(),
        );

        let report = coord.run(&job(), &[resume("slow.pdf", "slow")]).await;

        assert_eq!(report.scores["slow.pdf"], 0.0);
        assert!(matches!(
            &report.results[0].error,
            Some(ScoringIssue::Rating { message }) if message.contains("timed out")
        ));
        assert!(placement.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_rating_scores_zero_without_error() {
        let rater = ScriptedRater {
            replies: HashMap::from([("vague", Ok("Looks like a decent fit."))]),
        };
        let coord = coordinator(rater, Arc::new(RecordingPlacement::default()), 75.0);

        let report = coord.run(&job(), &[resume("v.pdf", "vague")]).await;

        assert_eq!(report.scores["v.pdf"], 0.0);
        assert_eq!(report.results[0].error, None);
    }

    #[test]
    fn test_threshold_from_value() {
        use serde_json::json;

        assert_eq!(Threshold::from_value(None).value(), 75.0);
        assert_eq!(Threshold::from_value(Some(&json!(60))).value(), 60.0);
        assert_eq!(Threshold::from_value(Some(&json!("82.5"))).value(), 82.5);
        assert_eq!(Threshold::from_value(Some(&json!(150))).value(), 75.0);
        assert_eq!(Threshold::from_value(Some(&json!(-1))).value(), 75.0);
        assert_eq!(Threshold::from_value(Some(&json!("high"))).value(), 75.0);
        assert_eq!(Threshold::from_value(Some(&json!(null))).value(), 75.0);
        assert_eq!(Threshold::from_f64(f64::NAN).value(), 75.0);
    }

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let issue = ScoringIssue::Placement {
            message: "gone".to_string(),
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["kind"], "placement");
        assert_eq!(value["message"], "gone");
    }
}
