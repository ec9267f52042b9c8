//! Main Entrypoint for the Kaira Agent Worker
//!
//! This binary is responsible for:
//! 1. Parsing the command line and loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the weather and search tool providers.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the worker and handling graceful shutdown.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kaira_agent::{config::Config, router::create_router, state::AppState};
use kaira_core::tools::{
    http_client,
    search::{DuckDuckGoProvider, SearchProvider},
    weather::{WeatherProvider, WttrProvider},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, error, info};

#[derive(Parser, Debug)]
#[command(name = "kaira-agent", version, about = "Kaira voice assistant worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the worker (default).
    Start,
    /// Run the worker with debug logging.
    Dev,
}

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Start);

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    let log_level = match command {
        Command::Dev => Level::DEBUG,
        Command::Start => config.log_level,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(?command, "Configuration loaded. Initializing tool providers...");

    // --- 3. Initialize Tool Providers ---
    let client = http_client(config.tool_timeout).context("Failed to build HTTP client")?;
    let weather: Arc<dyn WeatherProvider> = Arc::new(WttrProvider::new(
        client.clone(),
        config.weather_api_url.clone(),
    ));
    let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoProvider::new(
        client,
        config.search_api_url.clone(),
    ));

    let app_state = Arc::new(AppState {
        gemini_url: gemini_realtime::endpoint(&config.gemini_api_key),
        weather,
        search,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        model = %config.realtime_model,
        voice = %config.realtime_voice,
        bind_address = %config.bind_address,
        "Worker configured. Waiting for rooms..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Worker has shut down.");
    Ok(())
}
