mod config;
mod errors;
mod extraction;
mod ingest;
mod jobs;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod scoring;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::jobs::cleanup::spawn_cleanup_task;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::scoring::rating::LlmRater;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging comes up before config so threshold warnings are not lost
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    for dir in [&config.work_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    // Initialize LLM-backed rater
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let rater = Arc::new(LlmRater::new(llm));

    let state = AppState::new(config.clone(), rater);
    info!(
        threshold = state.config.score_threshold.value(),
        rating_timeout_secs = state.rating_policy.timeout.as_secs(),
        "Scoring configured"
    );

    spawn_cleanup_task(state.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
