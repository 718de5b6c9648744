//! Leaflet Studio - conversational leaflet design service
//!
//! A Rust backend orchestrating a conversational design agent: moderated
//! chat, asynchronous agent runs, and leaflet image synthesis.

mod api;
mod assistant;
mod db;
mod images;
mod moderation;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use assistant::{AssistantConfig, OpenAiThreadBridge};
use db::ConversationStore;
use images::DallEClient;
use moderation::{ModerationFailurePolicy, ModerationGate, OpenAiModeration};
use runtime::{ConversationEngine, PollPolicy, RunPoller, ToolDispatcher};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tools::{leaflet_tool_definition, LeafletSynthesisTool};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leaflet_studio=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("LEAFLET_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.leaflet-studio/leaflet.db")
    });

    let port: u16 = std::env::var("LEAFLET_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening conversation store");
    let store = ConversationStore::open(&db_path)?;

    let config = AssistantConfig::from_env();
    if config.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; agent calls will fail");
    }

    let bridge = OpenAiThreadBridge::new(config.api_key.clone(), config.base_url.as_deref());

    // Reuse the configured assistant or provision a fresh one carrying the
    // designer instructions and the leaflet tool
    let assistant_id = bridge
        .ensure_assistant(
            config.assistant_id.as_deref(),
            system_prompt::LEAFLET_DESIGNER_INSTRUCTIONS,
            &[leaflet_tool_definition()],
        )
        .await?;
    tracing::info!(assistant_id = %assistant_id, "Assistant ready");

    let moderation = OpenAiModeration::new(config.api_key.clone(), config.base_url.as_deref());
    let gate = ModerationGate::new(Arc::new(moderation), ModerationFailurePolicy::from_env());

    let image_client = DallEClient::new(config.api_key, config.base_url.as_deref());
    let leaflet_tool = Arc::new(LeafletSynthesisTool::new(
        store.clone(),
        Arc::new(image_client),
    ));

    // Cancelled on shutdown so in-flight run polls abort instead of
    // holding the server open for the full poll deadline
    let shutdown = CancellationToken::new();

    let engine = ConversationEngine::new(
        store,
        Arc::new(bridge),
        gate,
        ToolDispatcher::new(leaflet_tool),
        RunPoller::new(PollPolicy::from_env()),
        assistant_id,
        shutdown.clone(),
    );
    let state = AppState::new(engine);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Leaflet Studio server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
