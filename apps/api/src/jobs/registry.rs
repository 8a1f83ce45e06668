//! In-memory job registry. Jobs live for the lifetime of the process (or until cleanup).

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    JdUploaded,
    ResumesUploaded,
    MetadataUploaded,
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Once queued, a job is never started a second time.
    pub fn is_started(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing | JobStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jd_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub resume_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            jd_path: None,
            resume_folder: None,
            metadata_folder: None,
            output_dir: None,
            resume_count: 0,
            results: None,
            error: None,
        }
    }
}

/// Why a job could not be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueRejection {
    NotFound,
    MissingJobDescription,
    MissingResumes,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Job {
        let job = Job::new(Uuid::new_v4());
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Applies `f` to the job and returns the updated copy.
    pub async fn update<F>(&self, id: Uuid, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        f(job);
        job.updated_at = Utc::now();
        Some(job.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&id)
    }

    /// Moves the job to `queued` unless it has already been started.
    /// The flag is `false` when it was already started and nothing changed.
    pub async fn try_queue(&self, id: Uuid) -> Result<(Job, bool), QueueRejection> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(QueueRejection::NotFound)?;
        if job.status.is_started() {
            return Ok((job.clone(), false));
        }
        if job.jd_path.is_none() {
            return Err(QueueRejection::MissingJobDescription);
        }
        if job.resume_folder.is_none() {
            return Err(QueueRejection::MissingResumes);
        }
        job.status = JobStatus::Queued;
        job.error = None;
        job.updated_at = Utc::now();
        Ok((job.clone(), true))
    }

    /// Drops jobs last touched before `cutoff` and returns their ids.
    pub async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<Uuid> = jobs
            .values()
            .filter(|job| job.updated_at < cutoff && job.status != JobStatus::Processing)
            .map(|job| job.id)
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
