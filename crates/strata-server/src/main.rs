//! strata-server - REST API server binary.

use std::net::SocketAddr;

use strata_core::{BackgroundRuntime, EngineConfig, RuntimeConfig};
use strata_server::{create_server, AppState};
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// `STRATA_CONFIG` names a TOML/JSON/YAML file; otherwise the environment is used.
fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match std::env::var("STRATA_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading engine configuration from file");
            Ok(EngineConfig::from_file(path)?)
        }
        Err(_) => {
            let config = EngineConfig::from_env();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("strata_server=debug".parse()?),
        )
        .init();

    // Get configuration from environment
    let host = std::env::var("STRATA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("STRATA_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let config = load_config()?;
    let runtime_config = RuntimeConfig::from_engine(&config).with_env();

    // Create application state (router plus providers)
    let state = AppState::from_config(config)?;

    // Start background schedulers
    let mut runtime = BackgroundRuntime::new(state.router.clone(), runtime_config).await?;
    runtime.start().await?;
    info!("Background schedulers started (decay + patterns)");

    let app = create_server(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting strata-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping schedulers...");
        })
        .await?;

    // Cancels any in-flight decay pass at its next item boundary
    runtime.shutdown().await?;

    info!("Server stopped cleanly");
    Ok(())
}
