//! deploy-hook web server.
//!
//! This binary:
//! - Receives signed push webhooks on `POST /webhook`
//! - Starts the deploy script for the pushed project
//! - Returns 202 Accepted without waiting for the deployment
//!
//! Deployment progress and results are written to the audit log file.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deployhook::{router, AppState, AuditLog, Config, Dispatcher, FileAuditLog, ScriptRunner};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        log_file = %config.log_file.display(),
        deploy_runner = %config.deploy_runner.display(),
        deploy_script = %config.deploy_script.display(),
        deploy_timeout_seconds = config.deploy_timeout.as_secs(),
        request_timeout_seconds = config.request_timeout.as_secs(),
        "config_loaded"
    );

    let audit: Arc<dyn AuditLog> = Arc::new(FileAuditLog::new(config.log_file.clone()));
    audit.append("Starting Webhook Deploy Server...").await;

    let runner = Arc::new(ScriptRunner::new(
        config.deploy_runner.clone(),
        config.deploy_script.clone(),
    ));
    let dispatcher = Dispatcher::new(runner, Arc::clone(&audit), config.deploy_timeout);

    // Create application state
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, dispatcher, Arc::clone(&audit));

    // Build the router
    let app = router(state);

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Deployments still running are not awaited
    audit.append("Webhook Deploy Server stopped").await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
