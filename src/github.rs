//! GitHub REST API access: contributors, profiles, commits and rate limits.

pub mod client;
pub mod error;
pub mod types;

pub use client::{GitHubClient, HostFuture, RepositoryHost, DEFAULT_API_URL, PER_PAGE};
pub use error::GitHubError;
pub use types::{CommitStats, CommitSummary, RateLimitStatus, RateLimitWindow, RepoRef};
