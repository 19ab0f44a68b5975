//! Main Entrypoint for the Lingo API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates, with optional overrides from disk.
//! 3. Initializing the Gemini clients and the tutor service.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use lingo_api::{
    config::Config, router::create_router, state::AppState, workspace::Workspaces,
};
use lingo_core::{gemini::GeminiClient, prompts::PromptLibrary, tutor::Tutor};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    if config.gemini_api_key.is_none() {
        warn!("No GEMINI_API_KEY or API_KEY set; every model call will fail until one is provided");
    }

    // --- 3. Load Prompts ---
    let prompts = match &config.prompts_path {
        Some(path) => PromptLibrary::load(path)
            .with_context(|| format!("Failed to load prompts from {}", path.display()))?,
        None => PromptLibrary::default(),
    };

    // --- 4. Initialize Shared Services ---
    let client = GeminiClient::new(config.gemini_api_key.clone(), config.text_model.clone())
        .with_base_url(&config.gemini_base_url)
        .with_speech_model(config.speech_model.clone());
    let grammar_client = client.with_model(config.grammar_model.clone());

    let tutor = Tutor::new(Arc::new(client))
        .with_grammar_client(Arc::new(grammar_client))
        .with_prompts(prompts)
        .with_voice(config.tts_voice.clone());

    let workspaces = Workspaces::with_capacity(config.max_workspaces);
    let shutdown = CancellationToken::new();
    let reaper = workspaces.spawn_reaper(config.workspace_idle_timeout, shutdown.clone());

    let app_state = Arc::new(AppState::new(tutor).with_workspaces(workspaces));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        text_model = %config.text_model,
        grammar_model = %config.grammar_model,
        speech_model = %config.speech_model,
        voice = %config.tts_voice,
        bind_address = %config.bind_address,
        idle_timeout_secs = config.workspace_idle_timeout.as_secs(),
        max_workspaces = config.max_workspaces,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    reaper.await.context("Workspace reaper panicked")?;
    info!("Server has shut down.");
    Ok(())
}
