//! sketchd HTTP server
//!
//! Coordination layer for sketch-backed metrics ingestion and query.
//!
//! # Endpoints
//!
//! - `POST /ingest` - Admit a batch of samples into per-series sketches
//! - `GET /parse?q=<expr>` - Evaluate a function over a range vector
//! - `GET /health` - Liveness probe
//! - `GET /metrics` - Prometheus exposition
//! - `GET /debug-state` - Coverage inspection over synthetic series
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration and print a summary
//!
//! # Configuration
//!
//! Read from, in priority order: the `SKETCHD_CONFIG` environment variable
//! (path to a TOML file), `./sketchd.toml`, then defaults. The admission
//! bound additionally honors `MAX_INGEST_CONCURRENCY`.

mod config;
mod handlers;
mod types;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use handlers::AppState;
use sketchd::config::ApplicationConfig;
use sketchd::engine::{InMemorySketchEngine, SketchEngine};
use sketchd::ingestion::{AdmissionController, IngestionCoordinator, IngestionStats};
use sketchd::metrics::ExportMetrics;
use sketchd::query::{QueryReconciler, SizingPolicy};
use sketchd::services::{spawn_service, ShutdownSignal, ThroughputMonitor, ThroughputMonitorConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

// =============================================================================
// Router and Server Setup
// =============================================================================

/// Build the application router
fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/ingest", post(handlers::ingest))
        .route("/parse", get(handlers::parse))
        .route("/debug-state", get(handlers::debug_state))
        .with_state(state)
        .layer(cors)
}

/// Graceful shutdown signal handler
///
/// Handles signal registration failures by logging a warning and waiting
/// indefinitely (the server must then be killed forcefully), which beats
/// panicking during startup.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Wire up the shared application state from configuration.
fn build_state(config: ApplicationConfig) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    let engine: Arc<dyn SketchEngine> = Arc::new(InMemorySketchEngine::new());
    let export = Arc::new(ExportMetrics::new(config.query.instance_label.clone())?);
    let stats = Arc::new(IngestionStats::new());
    let admission = Arc::new(AdmissionController::new(
        config.ingestion.max_concurrent_inserts,
    ));

    let coordinator = IngestionCoordinator::new(
        Arc::clone(&engine),
        admission,
        Arc::clone(&stats),
        Arc::clone(&export),
    );
    let reconciler = QueryReconciler::new(
        Arc::clone(&engine),
        SizingPolicy {
            item_budget: config.query.sketch_item_budget,
            precision_hint: config.query.precision_hint,
        },
        Arc::clone(&export),
    );

    Ok(Arc::new(AppState {
        coordinator,
        reconciler,
        engine,
        export,
        config,
    }))
}

// =============================================================================
// CLI Definition
// =============================================================================

/// sketchd - sketch-backed metrics coordination service
#[derive(Parser)]
#[command(name = "sketchd")]
#[command(version)]
#[command(about = "Coordination layer for sketch-backed metrics ingestion and query", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides SKETCHD_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Override listen address (e.g. 0.0.0.0:7000)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration without starting the server
    CheckConfig,
}

/// Validate configuration and print a summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(config_path) = &cli.config {
        std::env::set_var("SKETCHD_CONFIG", config_path);
    }

    let config = config::load_config();
    config.validate()?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.server.listen_addr);
    println!("  Log level: {}", config.server.log_level);
    println!();
    println!("Ingestion:");
    println!(
        "  Max concurrent inserts: {}",
        config.ingestion.max_concurrent_inserts
    );
    println!(
        "  Forward endpoint: {}",
        config.ingestion.forward_endpoint.as_deref().unwrap_or("(unset)")
    );
    println!();
    println!("Query:");
    println!("  Sketch item budget: {}", config.query.sketch_item_budget);
    println!("  Precision hint: {}", config.query.precision_hint);
    println!("  Instance label: {}", config.query.instance_label);
    println!();
    println!("Monitoring:");
    println!(
        "  Throughput log: {:?} (every {}s)",
        config.monitoring.throughput_log_path, config.monitoring.throughput_interval_secs
    );

    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::Start) | None => {}
    }

    if let Some(config_path) = &cli.config {
        std::env::set_var("SKETCHD_CONFIG", config_path);
    }

    let mut config = config::load_config();
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen.clone();
    }
    config
        .validate()
        .map_err(sketchd::Error::Configuration)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting sketchd server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        listen_addr = %config.server.listen_addr,
        max_concurrent_inserts = config.ingestion.max_concurrent_inserts,
        "configuration loaded"
    );

    let state = build_state(config.clone())?;
    info!(engine = state.engine.engine_id(), "sketch engine initialized");

    // Throughput monitor runs for the process lifetime.
    let shutdown = ShutdownSignal::new();
    let monitor = Arc::new(ThroughputMonitor::new(
        ThroughputMonitorConfig {
            log_path: config.monitoring.throughput_log_path.clone(),
            interval: Duration::from_secs(config.monitoring.throughput_interval_secs),
        },
        Arc::clone(state.coordinator.stats()),
    ));
    let monitor_handle = spawn_service(monitor, shutdown.subscribe());

    let app = build_router(Arc::clone(&state));
    let addr: SocketAddr = config.server.listen_addr.parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background services before exit.
    shutdown.shutdown();
    let _ = monitor_handle.await;

    info!("Server shutdown complete");
    Ok(())
}
