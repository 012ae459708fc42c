//! threadline - conversational agent service
//!
//! A Rust backend orchestrating a tool-calling model agent over durable
//! conversation threads.

mod agent;
mod api;
mod llm;
mod session;
mod store;
mod thread;
mod tools;

use agent::{AgentConfig, AgentLoop, DEFAULT_MAX_CYCLES};
use api::{create_router, AppState};
use llm::{GroqClient, GroqConfig, LoggingClient};
use session::SessionManager;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use store::CheckpointStore;
use tools::ToolRegistry;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadline=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("THREADLINE_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.threadline/threadline.db")
    });

    let port: u16 = std::env::var("THREADLINE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    let max_cycles: u32 = std::env::var("THREADLINE_MAX_CYCLES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CYCLES);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open the checkpoint store
    tracing::info!(path = %db_path, "Opening checkpoint store");
    let store = CheckpointStore::open(&db_path)?;

    // Model client
    let groq_config = GroqConfig::from_env();
    if groq_config.api_key.is_none() {
        tracing::warn!("GROQ_API_KEY is not set; chat requests will fail until it is configured");
    }
    tracing::info!(model = %groq_config.model, "Model client initialized");
    let model = LoggingClient::new(Arc::new(GroqClient::new(groq_config)));

    // Tool registry, built once and immutable for the process lifetime
    let tools = Arc::new(ToolRegistry::builtin());

    let sessions = SessionManager::new(AgentLoop::new(
        store,
        model,
        tools,
        AgentConfig {
            max_cycles,
            ..AgentConfig::default()
        },
    ));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(sessions))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("threadline server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
