//! # Warden - reCAPTCHA Verification Gateway
//!
//! Verifies reCAPTCHA v2/v3 tokens on behalf of registered consumer
//! domains so their secrets never reach the browser.
//!
//! ## Architecture
//! ```text
//! Browser → Warden ─┬─ allow-list / local bypass
//!                   └─ siteverify (upstream)
//! ```

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod client_ip;
mod config;
mod cors;
mod fingerprint;
mod network;
mod rate_limit;
mod registry;
mod routes;
mod state;
mod upstream;
mod validator;

use config::AppConfig;
use state::AppState;

/// Warden - reCAPTCHA verification gateway
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML, JSON, or YAML)
    #[arg(short, long, default_value = "config/warden.toml", env = "WARDEN_CONFIG")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Listen port, keeping the configured host (overrides config)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Siteverify endpoint (overrides config)
    #[arg(long, env = "RECAPTCHA_ENDPOINT")]
    recaptcha_endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads the environment
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        domains = config.domains.len(),
        allowed_ips = config.allowed_ips.len(),
        auto_validate_local_ip = config.auto_validate_local_ip,
        endpoint = %config.recaptcha_endpoint,
        rate_limit = config.rate_limit.active,
        "Configuration loaded from {}",
        args.config
    );

    let listen_addr = config.listen_addr.clone();

    // Initialize application state
    let state = AppState::new(config)?;

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("Warden listening on {}", listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Warden shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}
