//! Per-contributor commit activity.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::github::{CommitStats, CommitSummary};

/// Days with more commits than this count as bursts.
pub const BURST_THRESHOLD: usize = 3;

/// Commit history summary of one contributor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitActivity {
    /// Number of commits.
    pub commits: usize,
    /// Earliest commit.
    pub first_commit: Option<DateTime<Utc>>,
    /// Latest commit.
    pub last_commit: Option<DateTime<Utc>>,
    /// Commits per day over the first-to-last span. Absent for a single
    /// commit or a span shorter than one day.
    pub commits_per_day: Option<f64>,
    /// Lines added, when line counts were fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertions: Option<u64>,
    /// Lines removed, when line counts were fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
    /// Days with more than [`BURST_THRESHOLD`] commits, in order.
    pub burst_days: Vec<NaiveDate>,
}

impl CommitActivity {
    /// Summarizes `commits` in any order.
    pub fn from_commits(commits: &[CommitSummary]) -> Self {
        let first_commit = commits.iter().map(|c| c.date).min();
        let last_commit = commits.iter().map(|c| c.date).max();

        let commits_per_day = match (first_commit, last_commit) {
            (Some(first), Some(last)) if commits.len() > 1 => {
                let days = (last - first).num_days();
                (days > 0).then(|| commits.len() as f64 / days as f64)
            }
            _ => None,
        };

        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for commit in commits {
            *per_day.entry(commit.date.date_naive()).or_default() += 1;
        }
        let burst_days = per_day
            .into_iter()
            .filter(|(_, count)| *count > BURST_THRESHOLD)
            .map(|(day, _)| day)
            .collect();

        Self {
            commits: commits.len(),
            first_commit,
            last_commit,
            commits_per_day,
            insertions: None,
            deletions: None,
            burst_days,
        }
    }

    /// Adds line counts summed over `stats`.
    #[must_use]
    pub fn with_line_counts<'a, I>(mut self, stats: I) -> Self
    where
        I: IntoIterator<Item = &'a CommitStats>,
    {
        let (insertions, deletions) = stats
            .into_iter()
            .fold((0, 0), |(adds, dels), s| (adds + s.additions, dels + s.deletions));
        self.insertions = Some(insertions);
        self.deletions = Some(deletions);
        self
    }
}
