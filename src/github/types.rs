//! GitHub data types and response shapes.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::GitHubError;

/// A repository on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Owning user or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Creates a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `https://github.com/<owner>/<repo>`, with an optional `.git`
    /// suffix or trailing slash.
    pub fn parse_url(input: &str) -> Result<Self, GitHubError> {
        let invalid = || GitHubError::InvalidRepositoryUrl(input.to_string());
        let url = Url::parse(input.trim()).map_err(|_| invalid())?;

        if !matches!(url.scheme(), "https" | "http") {
            return Err(invalid());
        }
        match url.host_str() {
            Some("github.com" | "www.github.com") => {}
            _ => return Err(invalid()),
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let [owner, name] = segments.as_slice() else {
            return Err(invalid());
        };
        let name = name.strip_suffix(".git").unwrap_or(*name);
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(*owner, name))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One commit of a contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Commit hash.
    pub sha: String,
    /// Author date.
    pub date: DateTime<Utc>,
}

/// Line counts of one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    /// Lines added.
    pub additions: u64,
    /// Lines removed.
    pub deletions: u64,
}

/// One rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub reset: DateTime<Utc>,
}

/// Rate-limit buckets relevant to an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// REST API bucket.
    pub core: RateLimitWindow,
    /// Search API bucket.
    pub search: RateLimitWindow,
    /// GraphQL bucket, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql: Option<RateLimitWindow>,
}

// Wire shapes.

#[derive(Debug, Deserialize)]
pub(crate) struct ContributorEntry {
    pub login: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub login: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitEntry {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetail {
    pub author: Option<CommitSignature>,
    pub committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitSignature {
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    pub stats: Option<CommitStats>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResources {
    pub core: RawWindow,
    pub search: RawWindow,
    pub graphql: Option<RawWindow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWindow {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

impl CommitEntry {
    /// Author date, falling back to the committer date.
    pub(crate) fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| self.commit.committer.as_ref().and_then(|c| c.date))
    }
}

impl From<RawWindow> for RateLimitWindow {
    fn from(raw: RawWindow) -> Self {
        Self {
            limit: raw.limit,
            remaining: raw.remaining,
            reset: Utc
                .timestamp_opt(raw.reset, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

impl From<RateLimitResponse> for RateLimitStatus {
    fn from(raw: RateLimitResponse) -> Self {
        Self {
            core: raw.resources.core.into(),
            search: raw.resources.search.into(),
            graphql: raw.resources.graphql.map(Into::into),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository_urls() {
        let expected = RepoRef::new("rust-lang", "rust");
        for url in [
            "https://github.com/rust-lang/rust",
            "https://github.com/rust-lang/rust/",
            "https://github.com/rust-lang/rust.git",
            "http://www.github.com/rust-lang/rust",
        ] {
            assert_eq!(RepoRef::parse_url(url).unwrap(), expected, "{url}");
        }
    }

    #[test]
    fn rejects_other_urls() {
        for url in [
            "https://gitlab.com/rust-lang/rust",
            "https://github.com/rust-lang",
            "https://github.com/rust-lang/rust/issues",
            "git@github.com:rust-lang/rust.git",
            "not a url",
            "https://github.com/rust-lang/.git",
        ] {
            assert!(
                matches!(
                    RepoRef::parse_url(url),
                    Err(GitHubError::InvalidRepositoryUrl(_))
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn display_is_owner_slash_name() {
        assert_eq!(RepoRef::new("a", "b").to_string(), "a/b");
    }

    #[test]
    fn commit_date_falls_back_to_committer() {
        let entry: CommitEntry = serde_json::from_value(serde_json::json!({
            "sha": "abc",
            "commit": {
                "author": null,
                "committer": { "date": "2024-03-01T12:00:00Z" }
            }
        }))
        .unwrap();
        assert_eq!(entry.date().unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn rate_limit_reset_converted() {
        let raw: RateLimitResponse = serde_json::from_value(serde_json::json!({
            "resources": {
                "core": { "limit": 5000, "remaining": 4999, "reset": 1_700_000_000 },
                "search": { "limit": 30, "remaining": 30, "reset": 1_700_000_000 }
            }
        }))
        .unwrap();
        let status = RateLimitStatus::from(raw);
        assert_eq!(status.core.limit, 5000);
        assert_eq!(status.core.reset.timestamp(), 1_700_000_000);
        assert!(status.graphql.is_none());
    }
}
