//! Repository analysis pipeline.
//!
//! Lists a repository's contributors, then runs one retrieval task per
//! contributor under the [`RetrievalCoordinator`]: profile fetch, evidence
//! fusion, denylist classification and, on request, commit activity.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::activity::CommitActivity;
use crate::geo::GeographyAnalyzer;
use crate::github::{GitHubError, RepoRef, RepositoryHost};
use crate::report::{AnalysisReport, ContributorReport, FailedContributor};
use crate::retrieval::{retry, RetrievalCoordinator};

/// What to collect besides geography.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Summarize each contributor's commits.
    pub commits: bool,
    /// Also sum line counts, one extra request per commit.
    pub line_counts: bool,
}

/// Analyses every contributor of `repo`.
///
/// Failing to list contributors is an error. Failures of individual
/// contributors are recorded in the report and do not affect the others.
pub async fn analyze_repository(
    host: Arc<dyn RepositoryHost>,
    repo: &RepoRef,
    analyzer: GeographyAnalyzer,
    coordinator: &RetrievalCoordinator,
    options: AnalysisOptions,
) -> Result<AnalysisReport> {
    let cancel = coordinator.cancellation_token();
    let (logins, _) = retry(coordinator.policy(), &cancel, "contributors", || {
        host.list_contributors(repo)
    })
    .await;
    let logins = logins.with_context(|| format!("Failed to list contributors of {repo}"))?;
    info!(repo = %repo, contributors = logins.len(), "Analysing contributors");

    let task_repo = Arc::new(repo.clone());
    let task_host = Arc::clone(&host);
    let summary = coordinator
        .fetch_all(logins, move |login: String| {
            let host = Arc::clone(&task_host);
            let repo = Arc::clone(&task_repo);
            let analyzer = analyzer.clone();
            async move { contributor_row(host.as_ref(), &repo, &analyzer, &login, options).await }
        })
        .await;

    let mut report = AnalysisReport::new(repo.to_string());
    report.cancelled = summary.cancelled;
    for outcome in summary.outcomes {
        match outcome.result {
            Ok(row) => report.contributors.push(row),
            Err(e) => report.failures.push(FailedContributor {
                username: outcome.item,
                attempts: outcome.attempts,
                error: e.to_string(),
            }),
        }
    }
    report.unsubmitted = summary.unsubmitted;
    Ok(report)
}

async fn contributor_row(
    host: &dyn RepositoryHost,
    repo: &RepoRef,
    analyzer: &GeographyAnalyzer,
    login: &str,
    options: AnalysisOptions,
) -> Result<ContributorReport, GitHubError> {
    let contributor = host.user_profile(login).await?;

    let activity = if options.commits {
        let commits = host.list_commits(repo, login).await?;
        let mut activity = CommitActivity::from_commits(&commits);
        if options.line_counts {
            let mut stats = Vec::with_capacity(commits.len());
            for commit in &commits {
                stats.push(host.commit_stats(repo, &commit.sha).await?);
            }
            activity = activity.with_line_counts(&stats);
        }
        Some(activity)
    } else {
        None
    };

    let geography = analyzer.identify(&contributor).await;
    Ok(ContributorReport::new(&geography, activity))
}
