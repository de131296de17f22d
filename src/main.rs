//! modelquota CLI - reserve and inspect per-model daily quota.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use owo_colors::OwoColorize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use modelquota::quota::{
    ConfigError, FileStore, QuotaConfig, QuotaError, QuotaReservoir, Reservation, StoreError,
};

/// Exit code when a reservation found every model exhausted.
const EXIT_EXHAUSTED: u8 = 3;

#[derive(Parser)]
#[command(name = "modelquota")]
#[command(author, version, about = "Per-model daily quota reservations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory holding the usage store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve quota units (concurrently when --count > 1)
    Reserve {
        #[arg(long, short = 'n', default_value_t = 1)]
        count: usize,
    },

    /// Show every recorded usage count
    Usage,

    /// Show today's usage per model
    Status,

    /// Drop usage history older than the retention window
    Prune {
        /// Days to keep (defaults to the configured retention_days)
        #[arg(long)]
        days: Option<u64>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open usage store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut config = QuotaConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let store = FileStore::open(&config.data_dir).await?;
    let reservoir = QuotaReservoir::from_config(&config, Arc::new(store))?;

    match cli.command {
        Commands::Reserve { count } => reserve(&reservoir, count, cli.json).await,
        Commands::Usage => {
            let usage = reservoir.current_usage().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&usage)?);
            } else if usage.is_empty() {
                println!("No usage recorded");
            } else {
                for (key, count) in usage.iter() {
                    println!("{}  {:<28} {}", key.day, key.resource, count);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let summary = reservoir.summary().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.format());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prune { days } => {
            let removed = reservoir.prune(days.unwrap_or(config.retention_days)).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "removed_days": removed }));
            } else {
                println!("Removed {} day(s) of usage history", removed);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn reserve(
    reservoir: &QuotaReservoir,
    count: usize,
    json: bool,
) -> Result<ExitCode, CliError> {
    let results = join_all((0..count).map(|_| reservoir.reserve())).await;

    let mut exhausted = false;
    for result in results {
        let reservation = result?;
        if json {
            println!("{}", serde_json::to_string(&reservation)?);
        }
        match reservation {
            Reservation::Granted(grant) => {
                if !json {
                    println!(
                        "{} {} ({}/{} used today)",
                        "granted".green(),
                        grant.resource,
                        grant.used,
                        grant.capacity
                    );
                }
            }
            Reservation::Exhausted { day } => {
                exhausted = true;
                if !json {
                    println!("{} all models for {}", "exhausted".yellow(), day);
                }
            }
        }
    }

    if exhausted {
        Ok(ExitCode::from(EXIT_EXHAUSTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
