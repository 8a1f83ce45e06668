use std::path::{Path as FsPath, PathBuf};

use anyhow::Context;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::parse_job_description;
use crate::ingest::documents::list_documents;
use crate::jobs::registry::{Job, JobStatus, QueueRejection};
use crate::models::job_description::{JobDescriptionRecord, ParseMode};
use crate::pipeline::{keys, Pipeline, PipelineState};
use crate::scoring::Threshold;
use crate::state::AppState;

const JD_FIELD: &str = "jd_file";
const RESUMES_FIELD: &str = "resumes";
const METADATA_FIELD: &str = "metadata_files";

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

impl JobResponse {
    fn new(job: &Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub folder_path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    /// Number or numeric string in `[0, 100]`; anything else falls back to the default.
    pub threshold: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ParseJdRequest {
    pub text: String,
    pub parse_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QualifiedResponse {
    pub job_id: Uuid,
    pub output_dir: PathBuf,
    pub files: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Upload helpers
// ────────────────────────────────────────────────────────────────────────────

/// Final path component of an uploaded file name; `None` for names that reduce to nothing.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Saves every file part named `field_name` into `dir`. Other parts are ignored.
async fn save_uploads(
    multipart: &mut Multipart,
    field_name: &str,
    dir: &FsPath,
) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", dir.display()))?;

    let mut saved = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let Some(name) = field.file_name().and_then(sanitize_file_name) else {
            return Err(AppError::Validation(format!(
                "every '{field_name}' part needs a file name"
            )));
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload '{name}': {e}")))?;
        let path = dir.join(&name);
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to save upload {}", path.display()))?;
        saved.push(path);
    }
    Ok(saved)
}

async fn existing_job(state: &AppState, job_id: Uuid) -> Result<Job, AppError> {
    state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

/// Inputs of a job are frozen once processing has been requested.
fn ensure_editable(job: &Job) -> Result<(), AppError> {
    if job.status.is_started() {
        return Err(AppError::Conflict(format!(
            "Job {} is already {:?}",
            job.id, job.status
        )));
    }
    Ok(())
}

async fn existing_dir(folder_path: &str) -> Result<PathBuf, AppError> {
    let path = PathBuf::from(folder_path.trim());
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => Ok(path),
        _ => Err(AppError::Validation(format!(
            "'{folder_path}' is not an existing directory"
        ))),
    }
}

fn job_dir(state: &AppState, job_id: Uuid) -> PathBuf {
    state.config.work_dir.join(job_id.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/jd
pub async fn handle_upload_jd(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let job = state.jobs.create().await;
    let dir = job_dir(&state, job.id);

    let saved = match save_uploads(&mut multipart, JD_FIELD, &dir).await {
        Ok(saved) if !saved.is_empty() => saved,
        result => {
            state.jobs.remove(job.id).await;
            let _ = fs::remove_dir_all(&dir).await;
            result?;
            return Err(AppError::Validation(format!(
                "multipart field '{JD_FIELD}' is required"
            )));
        }
    };

    let jd_path = saved[0].clone();
    let job = state
        .jobs
        .update(job.id, |j| {
            j.jd_path = Some(jd_path);
            j.status = JobStatus::JdUploaded;
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job.id)))?;

    info!(job_id = %job.id, "job created from uploaded job description");
    Ok((
        StatusCode::CREATED,
        Json(JobResponse::new(&job, "Job description uploaded")),
    ))
}

/// POST /api/v1/jobs/:job_id/resumes
pub async fn handle_upload_resumes(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<JobResponse>, AppError> {
    ensure_editable(&existing_job(&state, job_id).await?)?;
    let dir = job_dir(&state, job_id).join("resumes");

    let saved = save_uploads(&mut multipart, RESUMES_FIELD, &dir).await?;
    if saved.is_empty() {
        return Err(AppError::Validation(format!(
            "multipart field '{RESUMES_FIELD}' is required"
        )));
    }

    let count = saved.len();
    let job = state
        .jobs
        .update(job_id, |j| {
            j.resume_folder = Some(dir);
            j.resume_count = count;
            j.status = JobStatus::ResumesUploaded;
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    info!(%job_id, count, "resumes uploaded");
    Ok(Json(JobResponse::new(&job, format!("{count} resumes uploaded"))))
}

/// POST /api/v1/jobs/:job_id/metadata
pub async fn handle_upload_metadata(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<JobResponse>, AppError> {
    ensure_editable(&existing_job(&state, job_id).await?)?;
    let dir = job_dir(&state, job_id).join("metadata");

    let saved = save_uploads(&mut multipart, METADATA_FIELD, &dir).await?;
    let count = saved.len();
    let job = state
        .jobs
        .update(job_id, |j| {
            j.metadata_folder = Some(dir);
            j.status = JobStatus::MetadataUploaded;
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobResponse::new(
        &job,
        format!("{count} metadata files uploaded"),
    )))
}

/// POST /api/v1/jobs/:job_id/resume-folder
pub async fn handle_set_resume_folder(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<FolderRequest>,
) -> Result<Json<JobResponse>, AppError> {
    ensure_editable(&existing_job(&state, job_id).await?)?;
    let folder = existing_dir(&req.folder_path).await?;
    let count = list_documents(&folder)
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
        .len();

    let job = state
        .jobs
        .update(job_id, |j| {
            j.resume_folder = Some(folder);
            j.resume_count = count;
            j.status = JobStatus::ResumesUploaded;
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobResponse::new(
        &job,
        format!("Resume folder set ({count} documents)"),
    )))
}

/// POST /api/v1/jobs/:job_id/metadata-folder
pub async fn handle_set_metadata_folder(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<FolderRequest>,
) -> Result<Json<JobResponse>, AppError> {
    ensure_editable(&existing_job(&state, job_id).await?)?;
    let folder = existing_dir(&req.folder_path).await?;

    let job = state
        .jobs
        .update(job_id, |j| {
            j.metadata_folder = Some(folder);
            j.status = JobStatus::MetadataUploaded;
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobResponse::new(&job, "Metadata folder set")))
}

/// POST /api/v1/jobs/:job_id/output-dir
pub async fn handle_set_output_dir(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<FolderRequest>,
) -> Result<Json<JobResponse>, AppError> {
    ensure_editable(&existing_job(&state, job_id).await?)?;
    let folder = PathBuf::from(req.folder_path.trim());
    fs::create_dir_all(&folder).await.map_err(|e| {
        AppError::Validation(format!("cannot create '{}': {e}", folder.display()))
    })?;

    let job = state
        .jobs
        .update(job_id, |j| j.output_dir = Some(folder))
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobResponse::new(&job, "Output directory set")))
}

/// POST /api/v1/jobs/:job_id/process
pub async fn handle_process(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: Option<Json<ProcessRequest>>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (job, started) = state.jobs.try_queue(job_id).await.map_err(|r| match r {
        QueueRejection::NotFound => AppError::NotFound(format!("Job {job_id} not found")),
        QueueRejection::MissingJobDescription => {
            AppError::Validation("Upload a job description first".to_string())
        }
        QueueRejection::MissingResumes => {
            AppError::Validation("Upload resumes or set a resume folder first".to_string())
        }
    })?;
    if !started {
        return Ok((
            StatusCode::OK,
            Json(JobResponse::new(&job, "Job already started")),
        ));
    }

    let threshold = match &req.threshold {
        Some(value) => Threshold::from_value(Some(value)),
        None => state.config.score_threshold,
    };
    let output_dir = job
        .output_dir
        .clone()
        .unwrap_or_else(|| state.config.output_dir.join(job_id.to_string()));
    let job = state
        .jobs
        .update(job_id, |j| j.output_dir = Some(output_dir))
        .await
        .unwrap_or(job);

    tokio::spawn(run_job(state.clone(), job_id, threshold));
    info!(%job_id, threshold = threshold.value(), "job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(JobResponse::new(&job, "Processing started")),
    ))
}

/// GET /api/v1/jobs/:job_id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(existing_job(&state, job_id).await?))
}

/// GET /api/v1/jobs/:job_id/qualified
pub async fn handle_list_qualified(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<QualifiedResponse>, AppError> {
    let job = existing_job(&state, job_id).await?;
    if job.status != JobStatus::Completed {
        return Err(AppError::Validation(format!(
            "Job {job_id} is not completed (status: {:?})",
            job.status
        )));
    }
    let output_dir = job
        .output_dir
        .unwrap_or_else(|| state.config.output_dir.join(job_id.to_string()));

    let mut files = Vec::new();
    if let Ok(mut entries) = fs::read_dir(&output_dir).await {
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed to list {}", output_dir.display()))?
        {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    files.sort();

    Ok(Json(QualifiedResponse {
        job_id,
        output_dir,
        files,
    }))
}

/// POST /api/v1/jd/parse
pub async fn handle_parse_jd(
    Json(req): Json<ParseJdRequest>,
) -> Result<Json<JobDescriptionRecord>, AppError> {
    let mode = match req.parse_mode.as_deref() {
        Some(raw) => raw.parse::<ParseMode>().map_err(AppError::Validation)?,
        None => ParseMode::Full,
    };
    if req.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }
    let text = req.text;
    let record = tokio::task::spawn_blocking(move || parse_job_description(&text, mode))
        .await
        .context("job description parsing task failed")?;
    Ok(Json(record))
}

// ────────────────────────────────────────────────────────────────────────────
// Background processing
// ────────────────────────────────────────────────────────────────────────────

fn path_value(path: &FsPath) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Runs the pipeline for one job and records the outcome on the job.
async fn run_job(state: AppState, job_id: Uuid, threshold: Threshold) {
    let Some(job) = state
        .jobs
        .update(job_id, |j| j.status = JobStatus::Processing)
        .await
    else {
        warn!(%job_id, "job disappeared before processing");
        return;
    };

    let mut input = PipelineState::default().with_metadata(keys::SCORE_THRESHOLD, threshold.value());
    let paths = [
        (keys::JD_PATH, &job.jd_path),
        (keys::RESUME_FOLDER, &job.resume_folder),
        (keys::METADATA_FOLDER, &job.metadata_folder),
        (keys::OUTPUT_DIR, &job.output_dir),
    ];
    for (key, path) in paths {
        if let Some(path) = path {
            input.metadata.insert(key.to_string(), path_value(path));
        }
    }

    let report = Pipeline::new(state.rater.clone(), state.rating_policy)
        .run(input)
        .await;
    let metadata = &report.state.metadata;
    let results = json!({
        "scores": report.state.scores,
        "qualified_count": metadata.get(keys::QUALIFIED_COUNT).cloned().unwrap_or(json!(0)),
        "total_count": metadata.get(keys::TOTAL_COUNT).cloned().unwrap_or(json!(0)),
        "threshold": threshold.value(),
        "output_dir": job.output_dir,
        "scoring_results": metadata.get(keys::SCORING_RESULTS).cloned().unwrap_or(json!([])),
        "ingest_errors": metadata.get(keys::INGEST_ERRORS).cloned().unwrap_or(json!([])),
        "failures": report.failures,
    });

    let error = (!report.failures.is_empty()).then(|| {
        report
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.stage, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    });
    let status = if error.is_some() {
        JobStatus::Error
    } else {
        JobStatus::Completed
    };

    state
        .jobs
        .update(job_id, |j| {
            j.status = status;
            j.results = Some(results);
            j.error = error;
        })
        .await;
    info!(%job_id, ?status, "job finished");
}
