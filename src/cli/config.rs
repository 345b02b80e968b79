//! Configuration-related CLI commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{ConfidenceWeights, Settings, DEFAULT_WEIGHTS_PATH};

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the effective confidence weights.
    Weights(WeightsCommand),
    /// Shows where credentials are read from.
    Settings(SettingsCommand),
}

/// Weights command options.
#[derive(Parser)]
pub struct WeightsCommand {
    /// Confidence weights JSON.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_WEIGHTS_PATH)]
    pub weights: PathBuf,
}

/// Settings command options.
#[derive(Parser)]
pub struct SettingsCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Weights(cmd) => cmd.execute(),
            ConfigSubcommands::Settings(cmd) => cmd.execute(),
        }
    }
}

impl WeightsCommand {
    /// Executes the weights command.
    pub fn execute(self) -> Result<()> {
        let weights = ConfidenceWeights::load_from_path(&self.weights)
            .context("Failed to load confidence weights")?;
        print!(
            "{}",
            serde_yaml::to_string(&weights).context("Failed to serialize weights")?
        );
        println!("max_confidence: {}", weights.max_confidence());
        Ok(())
    }
}

impl SettingsCommand {
    /// Executes the settings command.
    pub fn execute(self) -> Result<()> {
        let path = Settings::get_settings_path()?;
        let settings = Settings::load_from_path(&path)?;
        println!("Settings file: {}", path.display());
        let mut keys: Vec<&String> = settings.env.keys().collect();
        keys.sort();
        for key in keys {
            println!("  {key}: set");
        }
        Ok(())
    }
}
