//! Analysis reports: per-contributor rows plus a run summary, rendered as
//! text or YAML.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::CommitActivity;
use crate::geo::ContributorGeography;

/// One contributor's row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorReport {
    /// Login name.
    pub username: String,
    /// Public email, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Country from the email domain.
    pub email_geo: String,
    /// Declared profile location, as written.
    pub profile_geo: String,
    /// Place the profile location matched.
    pub matched_place: String,
    /// Declared organization.
    pub organization_geo: String,
    /// Fused country.
    pub final_location: String,
    /// Confidence in percent.
    pub confidence: f64,
    /// Whether the fused country is on the denylist.
    pub flagged: bool,
    /// Whether cancellation cut a lookup short for this contributor.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
    /// Commit activity, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<CommitActivity>,
}

impl ContributorReport {
    /// Builds a row from an inferred geography.
    pub fn new(geography: &ContributorGeography, activity: Option<CommitActivity>) -> Self {
        let contributor = &geography.contributor;
        Self {
            username: contributor.username.clone(),
            email: contributor.email.clone(),
            email_geo: geography.evidence.email_geo.clone(),
            profile_geo: contributor.location_signal().to_string(),
            matched_place: geography.evidence.profile_geo.matched_place.clone(),
            organization_geo: geography.evidence.organization_geo.clone(),
            final_location: geography.fusion.final_location.clone(),
            confidence: (geography.fusion.confidence * 100.0).round() / 100.0,
            flagged: geography.flagged,
            interrupted: geography.interrupted,
            activity,
        }
    }
}

/// A contributor whose retrieval failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedContributor {
    /// Login name.
    pub username: String,
    /// Attempts made.
    pub attempts: u32,
    /// Final error.
    pub error: String,
}

/// Full result of analysing a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// `owner/name` of the repository.
    pub repository: String,
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Whether only flagged contributors are listed.
    pub adversarial: bool,
    /// Analysed contributors, in completion order.
    pub contributors: Vec<ContributorReport>,
    /// Contributors whose retrieval failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedContributor>,
    /// Contributors never analysed because the run was cancelled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsubmitted: Vec<String>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

impl AnalysisReport {
    /// Creates an empty report for `repository`.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            generated_at: Utc::now(),
            adversarial: false,
            contributors: Vec::new(),
            failures: Vec::new(),
            unsubmitted: Vec::new(),
            cancelled: false,
        }
    }

    /// Keeps only flagged contributors.
    #[must_use]
    pub fn adversarial_only(mut self) -> Self {
        self.contributors.retain(|c| c.flagged);
        self.adversarial = true;
        self
    }

    /// Number of flagged contributors.
    pub fn flagged_count(&self) -> usize {
        self.contributors.iter().filter(|c| c.flagged).count()
    }

    /// Serializes the report as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize report to YAML")
    }

    /// Renders the report as human-readable text.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Repository: {}\n", self.repository));
        if self.adversarial {
            out.push_str("Mode: adversarial (flagged contributors only)\n");
        }
        out.push('\n');

        for c in &self.contributors {
            out.push_str(&format!("Contributor: {}\n", c.username));
            out.push_str(&format!(
                "  Email: {}\n",
                c.email.as_deref().unwrap_or("N/A")
            ));
            out.push_str(&format!("  Email Geo: {}\n", c.email_geo));
            out.push_str(&format!(
                "  Profile Geo: {} (matched: {})\n",
                c.profile_geo, c.matched_place
            ));
            out.push_str(&format!("  Organization Geo: {}\n", c.organization_geo));
            out.push_str(&format!(
                "  Final Location: {} (confidence {:.2}%)\n",
                c.final_location, c.confidence
            ));
            if c.flagged {
                out.push_str("  Flagged: yes\n");
            }
            if c.interrupted {
                out.push_str("  Interrupted: lookups abandoned on cancellation\n");
            }
            if let Some(activity) = &c.activity {
                out.push_str(&render_activity(activity));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "Summary: {} analysed, {} flagged, {} failed, {} not started{}\n",
            self.contributors.len(),
            self.flagged_count(),
            self.failures.len(),
            self.unsubmitted.len(),
            if self.cancelled { " (cancelled)" } else { "" }
        ));
        for failure in &self.failures {
            out.push_str(&format!(
                "  Failed: {} after {} attempt(s): {}\n",
                failure.username, failure.attempts, failure.error
            ));
        }
        if !self.unsubmitted.is_empty() {
            out.push_str(&format!(
                "  Not started: {}\n",
                self.unsubmitted.join(", ")
            ));
        }
        out
    }
}

fn render_activity(activity: &CommitActivity) -> String {
    let date = |d: Option<DateTime<Utc>>| d.map_or_else(|| "N/A".to_string(), |d| d.to_rfc3339());
    let mut out = String::new();
    out.push_str(&format!("  Commits: {}\n", activity.commits));
    out.push_str(&format!("  First Commit: {}\n", date(activity.first_commit)));
    out.push_str(&format!("  Last Commit: {}\n", date(activity.last_commit)));
    match activity.commits_per_day {
        Some(rate) => out.push_str(&format!("  Commit Frequency: {rate:.2} commits per day\n")),
        None => out.push_str("  Commit Frequency: N/A\n"),
    }
    if let (Some(insertions), Some(deletions)) = (activity.insertions, activity.deletions) {
        out.push_str(&format!("  Insertions: {insertions}\n"));
        out.push_str(&format!("  Deletions: {deletions}\n"));
    }
    if activity.burst_days.is_empty() {
        out.push_str("  No significant commit bursts detected\n");
    } else {
        let days: Vec<String> = activity.burst_days.iter().map(ToString::to_string).collect();
        out.push_str(&format!("  Commit Bursts: {}\n", days.join(", ")));
    }
    out
}
