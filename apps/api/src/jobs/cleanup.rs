//! Housekeeping: drops job directories and registry entries older than the configured age.

use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppState;

/// How often the cleanup pass runs.
pub const CLEANUP_TICK: Duration = Duration::from_secs(3600);

/// Removes sub-directories of `root` last modified at least `max_age` ago.
/// A missing root is not an error.
pub async fn remove_expired_dirs(root: &Path, max_age: Duration) -> io::Result<usize> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_dir() {
            continue;
        }
        // Modification times in the future count as fresh.
        let expired = meta
            .modified()
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age >= max_age);
        if !expired {
            continue;
        }
        match fs::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove expired directory"),
        }
    }
    Ok(removed)
}

/// One pass over the work and output roots plus the job registry.
pub async fn run_cleanup(state: &AppState, max_age: Duration) {
    for root in [&state.config.work_dir, &state.config.output_dir] {
        match remove_expired_dirs(root, max_age).await {
            Ok(0) => {}
            Ok(removed) => info!(root = %root.display(), removed, "expired job directories removed"),
            Err(e) => warn!(root = %root.display(), error = %e, "cleanup pass failed"),
        }
    }

    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age));
    if let Some(cutoff) = cutoff {
        let expired = state.jobs.remove_older_than(cutoff).await;
        if !expired.is_empty() {
            let remaining = state.jobs.len().await;
            info!(removed = expired.len(), remaining, "expired jobs dropped");
        }
    }
}

pub fn spawn_cleanup_task(state: AppState) -> JoinHandle<()> {
    let max_age = state.config.cleanup_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_TICK);
        loop {
            ticker.tick().await;
            run_cleanup(&state, max_age).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::scoring::rating::{Rater, RatingError};
    use crate::scoring::Threshold;

    struct IdleRater;

    #[async_trait]
    impl Rater for IdleRater {
        async fn rate(&self, _prompt: &str) -> Result<String, RatingError> {
            Ok("Score: 0/100".to_string())
        }
    }

    fn app_state(root: &Path) -> AppState {
        let config = Config {
            anthropic_api_key: "test".to_string(),
            port: 0,
            work_dir: root.join("work"),
            output_dir: root.join("out"),
            score_threshold: Threshold::default(),
            rating_timeout: Duration::from_secs(5),
            cleanup_interval: Duration::ZERO,
        };
        AppState::new(config, Arc::new(IdleRater))
    }

    #[tokio::test]
    async fn test_run_cleanup_prunes_dirs_and_jobs() {
        let tmp = TempDir::new().unwrap();
        let state = app_state(tmp.path());
        let job = state.jobs.create().await;
        fs::create_dir_all(state.config.work_dir.join(job.id.to_string()))
            .await
            .unwrap();
        fs::create_dir_all(state.config.output_dir.join(job.id.to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        run_cleanup(&state, Duration::ZERO).await;

        assert!(state.jobs.get(job.id).await.is_none());
        assert_eq!(state.jobs.len().await, 0);
        assert!(!fs::try_exists(state.config.work_dir.join(job.id.to_string()))
            .await
            .unwrap());
        assert!(!fs::try_exists(state.config.output_dir.join(job.id.to_string()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_task_runs_on_spawn() {
        let tmp = TempDir::new().unwrap();
        let state = app_state(tmp.path());
        let job = state.jobs.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // The first interval tick fires immediately.
        let handle = spawn_cleanup_task(state.clone());
        for _ in 0..100 {
            if state.jobs.get(job.id).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(state.jobs.get(job.id).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_expired_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("job-a").join("resumes"))
            .await
            .unwrap();
        fs::write(tmp.path().join("loose.txt"), "keep").await.unwrap();

        let kept = remove_expired_dirs(tmp.path(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(kept, 0);
        assert!(fs::try_exists(tmp.path().join("job-a")).await.unwrap());

        let removed = remove_expired_dirs(tmp.path(), Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!fs::try_exists(tmp.path().join("job-a")).await.unwrap());
        assert!(fs::try_exists(tmp.path().join("loose.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_root_is_ok() {
        let tmp = TempDir::new().unwrap();
        let removed = remove_expired_dirs(&tmp.path().join("absent"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
