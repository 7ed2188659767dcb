//! Configuration loading for the LCS CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use lcs_core::XcsParams;
use lcs_rl::ExperimentConfig;

/// Configuration for the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
    pub xcs: XcsParams,
    pub experiment: ExperimentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Multiplexer address bits (2 gives the 6-multiplexer)
    pub address_bits: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self { address_bits: 2 }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = &config_path {
            builder = builder.add_source(File::from(path.clone()).required(explicit.is_some()));
        }

        // Environment variables with LCS__ prefix, e.g. LCS__XCS__POPULATION_SIZE
        builder = builder.add_source(
            Environment::with_prefix("LCS")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok((config, config_path))
    }

    /// Check every section before any run starts
    pub fn validate(&self) -> Result<()> {
        if self.environment.address_bits == 0 || self.environment.address_bits > 5 {
            anyhow::bail!(
                "environment.address_bits must lie in 1..=5, got {}",
                self.environment.address_bits
            );
        }
        self.xcs.validate_for(2).context("Invalid [xcs] section")?;
        self.experiment
            .validate()
            .context("Invalid [experiment] section")?;
        Ok(())
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: LCS_CONFIG env, ./lcs.toml, ~/.config/lcs/lcs.toml
        if let Ok(path) = std::env::var("LCS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("lcs.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("lcs").join("lcs.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}
