pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::jobs::handlers;
use crate::state::AppState;

/// Résumé batches are uploaded in one request.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/jd/parse", post(handlers::handle_parse_jd))
        // Job inputs
        .route("/api/v1/jobs/jd", post(handlers::handle_upload_jd))
        .route(
            "/api/v1/jobs/:job_id/resumes",
            post(handlers::handle_upload_resumes),
        )
        .route(
            "/api/v1/jobs/:job_id/metadata",
            post(handlers::handle_upload_metadata),
        )
        .route(
            "/api/v1/jobs/:job_id/resume-folder",
            post(handlers::handle_set_resume_folder),
        )
        .route(
            "/api/v1/jobs/:job_id/metadata-folder",
            post(handlers::handle_set_metadata_folder),
        )
        .route(
            "/api/v1/jobs/:job_id/output-dir",
            post(handlers::handle_set_output_dir),
        )
        // Processing and results
        .route(
            "/api/v1/jobs/:job_id/process",
            post(handlers::handle_process),
        )
        .route("/api/v1/jobs/:job_id", get(handlers::handle_get_job))
        .route(
            "/api/v1/jobs/:job_id/qualified",
            get(handlers::handle_list_qualified),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
