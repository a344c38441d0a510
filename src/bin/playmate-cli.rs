//! Playmate CLI Tool
//!
//! Runs matchmaking operations against the local registry and the Steam Web
//! API without starting the HTTP service. Output is JSON on stdout.
//!
//! Usage:
//!   STEAM_API_KEY=... cargo run --bin playmate-cli -- resolve gaben
//!   cargo run --bin playmate-cli -- register --id 1 --handle gaben
//!   cargo run --bin playmate-cli -- common --users 1,2,3
//!   cargo run --bin playmate-cli -- compat --user 1 --other 2
//!   cargo run --bin playmate-cli -- matches --user 1 --candidates 2,3,4 --limit 3
//!   cargo run --bin playmate-cli -- owners --title "dota" --candidates 1,2,3
//!   cargo run --bin playmate-cli -- stats --user 1

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use playmate::config::AppConfig;
use playmate::error::{classify, ErrorClass};
use playmate::service::AppState;
use playmate::types::LocalId;
use serde::Serialize;
use serde_json::json;

#[derive(Parser)]
#[command(name = "playmate-cli")]
#[command(about = "Run playmate matchmaking operations from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); environment variables are used otherwise
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level for diagnostics on stderr
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a Steam handle or vanity URL name to a platform id
    Resolve {
        /// Handle or numeric Steam id
        handle: String,
    },
    /// Link a local user to a Steam account
    Register {
        /// Local user id
        #[arg(short, long)]
        id: LocalId,
        /// Steam handle or numeric id
        #[arg(long)]
        handle: String,
        /// Display name (defaults to the Steam persona name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Games every listed user owns
    Common {
        /// Comma-separated local user ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        users: Vec<LocalId>,
    },
    /// Compatibility between two users
    Compat {
        #[arg(short, long)]
        user: LocalId,
        #[arg(short, long)]
        other: LocalId,
    },
    /// Candidates ranked by compatibility with a user
    Matches {
        #[arg(short, long)]
        user: LocalId,
        /// Comma-separated candidate ids
        #[arg(short, long, value_delimiter = ',')]
        candidates: Vec<LocalId>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Candidates owning a game whose name contains the title
    Owners {
        #[arg(short, long)]
        title: String,
        /// Comma-separated candidate ids
        #[arg(short, long, value_delimiter = ',')]
        candidates: Vec<LocalId>,
    },
    /// Library totals and top games for a user
    Stats {
        #[arg(short, long)]
        user: LocalId,
    },
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands, state: &AppState) -> Result<()> {
    let engine = state.engine();

    match command {
        Commands::Resolve { handle } => {
            let platform_id = state.steam().resolve_handle(&handle).await?;
            print_json(&json!({ "handle": handle, "platform_id": platform_id }))
        }
        Commands::Register { id, handle, name } => {
            let user = state.register_user(id, &handle, name.as_deref()).await?;
            print_json(&user)
        }
        Commands::Common { users } => {
            let games = engine.common_games(&users).await?;
            print_json(&json!({ "count": games.len(), "games": games }))
        }
        Commands::Compat { user, other } => {
            let result = engine.compatibility(user, other).await?;
            print_json(&result.report())
        }
        Commands::Matches {
            user,
            candidates,
            limit,
        } => {
            let matches = engine.find_best_matches(user, &candidates, limit).await?;
            let entries: Vec<_> = matches
                .iter()
                .map(|m| json!({ "local_id": m.local_id, "result": m.result.report() }))
                .collect();
            print_json(&json!({ "matches": entries }))
        }
        Commands::Owners { title, candidates } => {
            let owners = engine.find_players_for_game(&title, &candidates).await?;
            print_json(&json!({ "owners": owners }))
        }
        Commands::Stats { user } => {
            let stats = engine.library_stats(user).await?;
            print_json(&stats)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    let state = AppState::new(config).await?;

    if let Err(e) = run(cli.command, &state).await {
        match classify(&e) {
            ErrorClass::NotRegistered => eprintln!("{} (register first)", e),
            ErrorClass::Transient => eprintln!("Steam is unavailable, try again later: {}", e),
            ErrorClass::InvalidInput | ErrorClass::Internal => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}
