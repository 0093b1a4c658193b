//! yield-agents HTTP Server
//!
//! Axum front door for the agent system: a one-shot query endpoint and a
//! WebSocket that speaks the session protocol directly.

mod handlers;
mod state;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yield_advisor::{analyzer::sources_from_config, load_knowledge, spawn_system, AdvisorConfig};

use crate::handlers::{health_check, query_handler, session_handler};
use crate::state::AppState;

fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Agent API
        .route("/api/query", post(query_handler))
        .route("/api/session", get(session_handler))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = AdvisorConfig::from_env();

    let knowledge = load_knowledge(&config);
    let sources = sources_from_config(&config);
    if config.yield_sources.is_empty() {
        tracing::warn!("⚠ No YIELD_SOURCES configured - serving demo quotes");
    }

    let system = spawn_system(&config, sources, knowledge);
    tracing::info!(
        reasoner = system.reasoner_kind,
        knowledge = system.knowledge_available,
        "✓ Agents running"
    );

    let addr = config.bind_addr.clone();
    let app = app(AppState::new(system, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 yield-agents server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health      - Health check");
    tracing::info!("  POST /api/query   - Ask one question");
    tracing::info!("  GET  /api/session - WebSocket session protocol");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
