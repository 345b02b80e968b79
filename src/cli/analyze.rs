//! Analyze command: contributor geography for one repository.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{DataArgs, OutputFormat};
use crate::analysis::{analyze_repository, AnalysisOptions};
use crate::config::ReferenceData;
use crate::domain::{DnsMxLookup, DomainResolver, WhoisLookup};
use crate::geo::{Denylist, GeographyAnalyzer};
use crate::geocode::LocationIqClient;
use crate::github::{GitHubClient, RepoRef};
use crate::retrieval::{RetrievalCoordinator, RetryPolicy, DEFAULT_POOL_SIZE};

/// Analyze command options.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Repository URL (e.g., https://github.com/owner/repo).
    #[arg(value_name = "REPO_URL")]
    pub repo_url: String,

    /// Lists only contributors whose location is on the denylist.
    #[arg(long)]
    pub adversarial: bool,

    /// Countries to flag instead of the default denylist.
    #[arg(long = "deny", value_name = "COUNTRY")]
    pub deny: Vec<String>,

    /// Includes commit activity per contributor.
    #[arg(long)]
    pub commits: bool,

    /// Includes insertions and deletions (one request per commit).
    #[arg(long, requires = "commits")]
    pub stats: bool,

    /// Maximum number of contributors processed concurrently.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub concurrency: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Geocodes profile locations the gazetteer cannot place (needs
    /// LOCATIONIQ_API_KEY).
    #[arg(long)]
    pub geocode: bool,

    /// Reference data locations.
    #[command(flatten)]
    pub data: DataArgs,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub async fn execute(self) -> Result<()> {
        let data = ReferenceData::load(&self.data.paths()).context("Failed to load reference data")?;
        let repo = RepoRef::parse_url(&self.repo_url)?;
        let host = Arc::new(GitHubClient::from_env()?);

        let cancel = CancellationToken::new();
        spawn_interrupt_handler(cancel.clone());

        let resolver = DomainResolver::new(
            Arc::new(WhoisLookup::new()?),
            Arc::new(DnsMxLookup::new()),
        )
        .with_cancellation(cancel.clone());

        let denylist = if self.deny.is_empty() {
            Denylist::default_for(&data.gazetteer)
        } else {
            Denylist::canonicalized(&self.deny, &data.gazetteer)
        };
        debug!(entries = denylist.len(), "Loaded denylist");

        let mut analyzer =
            GeographyAnalyzer::new(&data, resolver, denylist).with_cancellation(cancel.clone());
        if self.geocode {
            let geocoder = LocationIqClient::from_env().context("Geocoding requested")?;
            analyzer = analyzer.with_geocoder(Arc::new(geocoder));
        }

        let coordinator = RetrievalCoordinator::new(self.concurrency, RetryPolicy::exponential())
            .with_cancellation(cancel);
        let options = AnalysisOptions {
            commits: self.commits,
            line_counts: self.stats,
        };

        let mut report = analyze_repository(host, &repo, analyzer, &coordinator, options).await?;
        if self.adversarial {
            report = report.adversarial_only();
        }

        match self.format {
            OutputFormat::Text => print!("{}", report.render_text()),
            OutputFormat::Yaml => print!("{}", report.to_yaml()?),
        }
        Ok(())
    }
}

/// Cancels `cancel` on Ctrl-C. Contributors already started run to
/// completion; the rest are reported as not started.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing contributors already in progress");
            cancel.cancel();
        }
    });
}
