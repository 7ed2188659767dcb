//! Configuration management commands

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    Show,
}

pub async fn run(cmd: ConfigCommands, config: &Config, source: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config, source).await,
    }
}

async fn show(config: &Config, source: Option<&Path>) -> Result<()> {
    match source {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# No configuration file found. Using defaults."),
    }
    println!("# Environment overrides use LCS__<SECTION>__<KEY>\n");
    print!("{}", config.to_toml()?);
    Ok(())
}
