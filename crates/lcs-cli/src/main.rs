//! LCS CLI - Command line interface for XCS experiments
//!
//! Trains XCS on the Boolean multiplexer, writes population checkpoints and
//! inspects them.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{inspect, run};

#[derive(Parser)]
#[command(name = "lcs")]
#[command(author, version, about = "LCS - XCS learning classifier system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to LCS_CONFIG, ./lcs.toml, ~/.config/lcs/lcs.toml)
    #[arg(short, long, global = true, env = "LCS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and evaluate on the multiplexer
    Run(run::RunArgs),

    /// Show statistics and the fittest rules of a checkpoint
    Inspect(inspect::InspectArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = config::Config::load(cli.config.as_deref())?;

    // Initialize logging based on verbosity
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lcs_cli={log_level},lcs_rl={log_level}").into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match &config_path {
        Some(path) => tracing::info!("Loaded config from: {:?}", path),
        None => tracing::info!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Run(args) => run::run(args, config).await,
        Commands::Inspect(args) => inspect::run(args).await,
        Commands::Config(cmd) => commands::config::run(cmd, &config, config_path.as_deref()).await,
    }
}
