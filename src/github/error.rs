//! GitHub API errors.

use thiserror::Error;

use crate::retrieval::{RetryClass, Retryable};

/// Errors returned by the GitHub client.
#[derive(Error, Debug)]
pub enum GitHubError {
    /// No token in the environment or the settings file.
    #[error("GitHub token not found. Set the GITHUB_TOKEN environment variable")]
    TokenNotFound,

    /// The rate-limit budget is spent.
    #[error("GitHub rate limit exceeded{}", .reset.map(|r| format!(" (resets at {r})")).unwrap_or_default())]
    RateLimited {
        /// Unix time at which the budget resets, if reported.
        reset: Option<i64>,
    },

    /// Network failure or server-side error.
    #[error("Transient GitHub error: {0}")]
    Transient(String),

    /// Any other non-success status.
    #[error("GitHub API request failed: HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response format from GitHub API: {0}")]
    InvalidResponse(String),

    /// The repository URL is not `https://github.com/<owner>/<repo>`.
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepositoryUrl(String),
}

impl Retryable for GitHubError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } => RetryClass::RateLimited,
            Self::Transient(_) => RetryClass::Transient,
            Self::TokenNotFound
            | Self::Api { .. }
            | Self::InvalidResponse(_)
            | Self::InvalidRepositoryUrl(_) => RetryClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classes() {
        assert_eq!(
            GitHubError::RateLimited { reset: None }.retry_class(),
            RetryClass::RateLimited
        );
        assert_eq!(
            GitHubError::Transient("502".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            GitHubError::Api {
                status: 404,
                message: "Not Found".into()
            }
            .retry_class(),
            RetryClass::Permanent
        );
    }

    #[test]
    fn rate_limit_message_includes_reset() {
        let err = GitHubError::RateLimited {
            reset: Some(1_700_000_000),
        };
        assert!(err.to_string().contains("1700000000"));
        assert_eq!(
            GitHubError::RateLimited { reset: None }.to_string(),
            "GitHub rate limit exceeded"
        );
    }
}
