//! Resolve command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use crate::domain::{DnsMxLookup, DomainResolver, WhoisLookup};

/// Resolve command options.
#[derive(Parser)]
pub struct ResolveCommand {
    /// Email address or bare domain.
    #[arg(value_name = "EMAIL")]
    pub email: String,
}

impl ResolveCommand {
    /// Executes the resolve command.
    pub async fn execute(self) -> Result<()> {
        let resolver = DomainResolver::new(
            Arc::new(WhoisLookup::new()?),
            Arc::new(DnsMxLookup::new()),
        );
        let info = resolver.resolve(&self.email).await;
        print!(
            "{}",
            serde_yaml::to_string(&info).context("Failed to serialize result")?
        );
        Ok(())
    }
}
