//! CLI interface for geo-provenance.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{
    DataPaths, DEFAULT_COUNTRY_CODES_PATH, DEFAULT_WEIGHTS_PATH, DEFAULT_WORLD_CITIES_PATH,
};

pub mod analyze;
pub mod config;
pub mod normalize;
pub mod rate_limit;
pub mod resolve;

/// geo-provenance: infers where a repository's contributors are based.
#[derive(Parser)]
#[command(name = "geo-provenance")]
#[command(about = "Infers contributor geography for a GitHub repository", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Increases log detail (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Logs errors only.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Analyses the contributors of a repository.
    Analyze(analyze::AnalyzeCommand),
    /// Normalizes a free-text location.
    Normalize(normalize::NormalizeCommand),
    /// Resolves the registration geography of an email domain.
    Resolve(resolve::ResolveCommand),
    /// Shows the GitHub API rate-limit status.
    #[command(name = "rate-limit")]
    RateLimit(rate_limit::RateLimitCommand),
    /// Configuration information.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Log filter selected by `--quiet` and `-v`.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze(cmd) => cmd.execute().await,
            Commands::Normalize(cmd) => cmd.execute(),
            Commands::Resolve(cmd) => cmd.execute().await,
            Commands::RateLimit(cmd) => cmd.execute().await,
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// YAML.
    Yaml,
}

/// Locations of the reference data files.
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Country-code table.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_COUNTRY_CODES_PATH)]
    pub country_codes: PathBuf,

    /// World-cities table.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_WORLD_CITIES_PATH)]
    pub world_cities: PathBuf,

    /// Confidence weights JSON.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_WEIGHTS_PATH)]
    pub weights: PathBuf,
}

impl DataArgs {
    /// The paths as a [`DataPaths`].
    pub fn paths(&self) -> DataPaths {
        DataPaths {
            country_codes: self.country_codes.clone(),
            world_cities: self.world_cities.clone(),
            weights: self.weights.clone(),
        }
    }
}
