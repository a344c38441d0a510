//! Playmate service binary
//!
//! Loads configuration, starts the HTTP API with its background tasks and
//! runs until SIGINT or SIGTERM, then shuts down within the configured
//! timeout.

use anyhow::Result;
use clap::Parser;
use playmate::config::{validate_config, AppConfig};
use playmate::service::{AppState, HealthCheck, HealthStatus, PlaymateService};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Playmate - shared games and compatibility scores for Steam users
#[derive(Parser)]
#[command(
    name = "playmate",
    version,
    about = "Game-library matchmaking service for Steam users",
    long_about = "Playmate links chat users to Steam accounts and compares their game \
                 libraries: games a whole group owns, pairwise compatibility scores, \
                 best-match ranking and owner search, served over a JSON HTTP API."
)]
struct Args {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run the health checks once and exit non-zero unless healthy
    #[arg(long)]
    health_check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Port for the HTTP API, probes and metrics
    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    /// SQLite database path
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Configuration from file or environment with command line overrides applied
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        if let Some(level) = &self.log_level {
            config.service.log_level = level.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(port) = self.http_port {
            config.service.http_port = port;
        }
        if let Some(path) = &self.database {
            config.database.path = path.clone();
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// One-shot health check for container probes
async fn run_health_check(config: AppConfig) -> ExitCode {
    let state = match AppState::new(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize for health check: {}", e);
            return ExitCode::FAILURE;
        }
    };
    state.set_running(true).await;

    let health = match HealthCheck::check(state).await {
        Ok(health) => health,
        Err(e) => {
            error!("Health check failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{} {}: {}", health.service, health.version, health.status);
    for check in &health.checks {
        match &check.message {
            Some(message) => println!("  {}: {} ({})", check.name, check.status, message),
            None => println!("  {}: {}", check.name, check.status),
        }
    }
    println!("  registered users: {}", health.stats.registered_users);

    if health.status == HealthStatus::Healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

fn log_startup(config: &AppConfig) {
    info!("🚀 {} v{}", config.service.name, playmate::VERSION);
    info!(
        "   HTTP {}:{} | database {} | log level {}",
        config.service.http_host,
        config.service.http_port,
        config.database.path,
        config.service.log_level
    );
    info!(
        "   Steam {} | {} attempts, backoff x{} | {} concurrent fetches",
        config.steam.api_base_url,
        config.retry.max_attempts,
        config.retry.backoff_factor,
        config.matchmaking.max_concurrent_fetches
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if args.health_check {
        return run_health_check(config).await;
    }

    log_startup(&config);
    if args.dry_run {
        info!("Configuration is valid, exiting (dry run)");
        return ExitCode::SUCCESS;
    }

    let mut service = match PlaymateService::new(config.clone()).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = service.start().await {
        error!("Failed to start service: {}", e);
        return ExitCode::FAILURE;
    }
    info!("✅ Playmate is running, press Ctrl+C to stop");

    shutdown_signal().await;
    info!("🛑 Shutting down...");

    match tokio::time::timeout(config.shutdown_timeout(), service.shutdown()).await {
        Ok(Ok(())) => info!("✅ Shutdown complete"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("Shutdown timed out after {:?}", config.shutdown_timeout()),
    }

    ExitCode::SUCCESS
}
