//! Rate-limit command.

use anyhow::{Context, Result};
use clap::Parser;

use crate::github::{GitHubClient, RateLimitWindow, RepositoryHost};

/// Rate-limit command options.
#[derive(Parser)]
pub struct RateLimitCommand {}

impl RateLimitCommand {
    /// Executes the rate-limit command.
    pub async fn execute(self) -> Result<()> {
        let client = GitHubClient::from_env()?;
        let status = client
            .rate_limit()
            .await
            .context("Failed to read GitHub rate limit")?;

        print_window("Core", &status.core);
        print_window("Search", &status.search);
        if let Some(graphql) = &status.graphql {
            print_window("GraphQL", graphql);
        }
        Ok(())
    }
}

fn print_window(name: &str, window: &RateLimitWindow) {
    println!(
        "{name}: {}/{} remaining, resets at {}",
        window.remaining,
        window.limit,
        window.reset.to_rfc3339()
    );
}
