use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::scoring::Threshold;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    /// Per-job upload directories live under `work_dir/<job_id>`.
    pub work_dir: PathBuf,
    /// Qualifying résumés land in `output_dir/<job_id>` unless the job overrides it.
    pub output_dir: PathBuf,
    pub score_threshold: Threshold,
    pub rating_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            work_dir: env_or("WORK_DIR", "temp").into(),
            output_dir: env_or("OUTPUT_DIR", "filtered_resumes").into(),
            // Out-of-range or non-numeric values fall back to the default with a warning.
            score_threshold: Threshold::from_value(
                std::env::var("SCORE_THRESHOLD").ok().map(Value::String).as_ref(),
            ),
            rating_timeout: Duration::from_secs(parse_env("RATING_TIMEOUT_SECS", 60)?),
            cleanup_interval: hours(parse_env("CLEANUP_INTERVAL_HOURS", 24)?)
                .context("CLEANUP_INTERVAL_HOURS is too large")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn hours(count: u64) -> Option<Duration> {
    count.checked_mul(3600).map(Duration::from_secs)
}
