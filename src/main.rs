//! Main entry point for the Stranger Room chat service
//!
//! This is the production entry point that initializes and runs the
//! matchmaking and relay service with error handling, logging, and
//! graceful shutdown.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stranger_room::config::{AppConfig, MatchPolicyKind};
use stranger_room::service::{AppState, HealthCheck, HealthProbe};
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Stranger Room - anonymous one-to-one chat matchmaking
#[derive(Parser)]
#[command(
    name = "stranger-room",
    version,
    about = "Pairs anonymous strangers for one-to-one chat over WebSockets",
    long_about = "Stranger Room accepts WebSocket clients, keeps a waiting queue of people \
                 looking for a partner, pairs them by shared interests, and relays messages \
                 and typing signals inside each private session."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Probe a running instance and exit
    #[arg(long, help = "Query the local /alive endpoint and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// WebSocket port override
    #[arg(long, value_name = "PORT", help = "Override WebSocket server port")]
    http_port: Option<u16>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health and metrics server port")]
    health_port: Option<u16>,

    /// Match policy override
    #[arg(long, value_name = "POLICY", help = "Match policy (fifo, interest)")]
    match_policy: Option<MatchPolicyKind>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Ask the local health server whether the service is alive
async fn perform_health_check(config: &AppConfig) -> Result<bool> {
    let url = format!("http://127.0.0.1:{}/alive", config.service.health_port);
    info!("Performing health check against {}", url);

    let client = reqwest::Client::new();
    let resp = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    println!("Health Check: {} {}", status, body);
    Ok(status.is_success())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Run periodic health checks
async fn health_check_task(probe: HealthProbe) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while probe.is_running().await {
        interval.tick().await;

        match HealthCheck::check(&probe).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} online, {} waiting, {} active sessions",
                    health.status,
                    health.stats.online,
                    health.stats.waiting,
                    health.stats.active_sessions
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Stranger Room Chat Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   WebSocket: ws://{}:{}/ws",
        config.service.host, config.service.http_port
    );
    info!("   Health port: {}", config.service.health_port);
    info!("   Match policy: {}", config.matchmaking.match_policy);
    info!(
        "   Reports before cooldown: {} ({}s cooldown)",
        config.matchmaking.report_threshold, config.matchmaking.cooldown_seconds
    );
    info!(
        "   Auto requeue partner: {}",
        config.matchmaking.auto_requeue_partner
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(match_policy) = args.match_policy {
        config.matchmaking.match_policy = match_policy;
    }

    stranger_room::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        match perform_health_check(&config).await {
            Ok(true) => std::process::exit(0),
            Ok(false) => std::process::exit(1),
            Err(e) => {
                error!("Health check failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.health_probe()));

    info!("✅ Stranger Room Chat Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            error!("Shutdown finished with errors: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Stranger Room Chat Service stopped");
    Ok(())
}
