mod analysis;
mod config;
mod errors;
mod index;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::coordinator::AnalysisCoordinator;
use crate::analysis::skill_matcher::LlmSkillExtractor;
use crate::config::Config;
use crate::index::KeywordIndex;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Critique API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize the analysis core (KeywordIndex by default; any VectorIndex can be injected)
    let settings = config.analysis_settings();
    info!(
        "Analysis settings: {} calls in flight, {}s deadline, {}s skill deadline, {} attempts",
        settings.max_in_flight,
        settings.deadline.as_secs(),
        settings.skill_deadline.as_secs(),
        settings.retry.max_attempts
    );
    let coordinator = AnalysisCoordinator::new(
        Arc::new(llm),
        Arc::new(KeywordIndex),
        Arc::new(LlmSkillExtractor),
        settings,
    );

    // Build app state
    let state = AppState {
        coordinator: Arc::new(coordinator),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
