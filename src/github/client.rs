//! GitHub REST client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::error::GitHubError;
use super::types::{
    CommitEntry, CommitResponse, CommitStats, CommitSummary, ContributorEntry, RateLimitResponse,
    RateLimitStatus, RepoRef, UserResponse,
};
use crate::config::settings::{get_env_var, GITHUB_TOKEN_VAR};
use crate::contributor::Contributor;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Page size for listing endpoints.
pub const PER_PAGE: usize = 100;

/// HTTP request timeout for GitHub calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("geo-provenance/", env!("CARGO_PKG_VERSION"));

/// Boxed future returned by [`RepositoryHost`] methods.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GitHubError>> + Send + 'a>>;

/// Read access to a repository hosting service.
pub trait RepositoryHost: Send + Sync {
    /// Logins of every contributor, in the host's order.
    fn list_contributors<'a>(&'a self, repo: &'a RepoRef) -> HostFuture<'a, Vec<String>>;

    /// Public profile of `login`.
    fn user_profile<'a>(&'a self, login: &'a str) -> HostFuture<'a, Contributor>;

    /// Commits authored by `login`, newest first.
    fn list_commits<'a>(
        &'a self,
        repo: &'a RepoRef,
        login: &'a str,
    ) -> HostFuture<'a, Vec<CommitSummary>>;

    /// Line counts of one commit.
    fn commit_stats<'a>(&'a self, repo: &'a RepoRef, sha: &'a str) -> HostFuture<'a, CommitStats>;

    /// Current rate-limit status.
    fn rate_limit(&self) -> HostFuture<'_, RateLimitStatus>;
}

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Creates a client for the public API.
    pub fn new(token: Option<String>) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_API_URL, token)
    }

    /// Creates a client for the API rooted at `base_url`.
    pub fn with_base_url(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Creates a client authenticated with the token from the environment
    /// or the settings file.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = get_env_var(GITHUB_TOKEN_VAR).map_err(|_| GitHubError::TokenNotFound)?;
        Self::new(Some(token))
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, GitHubError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| GitHubError::InvalidResponse(format!("bad endpoint {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GitHubError> {
        debug!(url = %url, "Sending GitHub API request");

        let mut request = self
            .client
            .get(url)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GitHubError::Transient(e.to_string()))?;
        let response = check_response(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| GitHubError::InvalidResponse(e.to_string()))
    }

    /// Fetches pages of `path` until a page comes back short.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, GitHubError> {
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();
        for page in 1_usize.. {
            let page_str = page.to_string();
            let mut params = query.to_vec();
            params.push(("per_page", per_page.as_str()));
            params.push(("page", page_str.as_str()));

            let batch: Vec<T> = self.get_json(self.endpoint(path, &params)?).await?;
            let len = batch.len();
            items.extend(batch);
            debug!(path = %path, page, len, "Fetched page");
            if len < PER_PAGE {
                break;
            }
        }
        Ok(items)
    }
}

/// Maps a non-success response onto the error classes callers retry on.
async fn check_response(response: Response) -> Result<Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers();
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let remaining = header("x-ratelimit-remaining").map(str::to_string);
    let reset = header("x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok());

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && remaining.as_deref() == Some("0"));
    if rate_limited {
        return Err(GitHubError::RateLimited { reset });
    }

    let message = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    if status.is_server_error() {
        return Err(GitHubError::Transient(format!("HTTP {status}: {message}")));
    }
    Err(GitHubError::Api {
        status: status.as_u16(),
        message,
    })
}

impl RepositoryHost for GitHubClient {
    fn list_contributors<'a>(&'a self, repo: &'a RepoRef) -> HostFuture<'a, Vec<String>> {
        Box::pin(async move {
            info!(repo = %repo, "Listing contributors");
            let path = format!("repos/{}/{}/contributors", repo.owner, repo.name);
            let entries: Vec<ContributorEntry> = self.get_paged(&path, &[]).await?;
            Ok(entries.into_iter().filter_map(|e| e.login).collect())
        })
    }

    fn user_profile<'a>(&'a self, login: &'a str) -> HostFuture<'a, Contributor> {
        Box::pin(async move {
            let url = self.endpoint(&format!("users/{login}"), &[])?;
            let user: UserResponse = self.get_json(url).await?;

            let mut contributor = Contributor::new(user.login);
            if let Some(email) = user.email {
                contributor = contributor.with_email(email);
            }
            if let Some(location) = user.location {
                contributor = contributor.with_location(location);
            }
            if let Some(company) = user.company {
                contributor = contributor.with_organization(company);
            }
            Ok(contributor)
        })
    }

    fn list_commits<'a>(
        &'a self,
        repo: &'a RepoRef,
        login: &'a str,
    ) -> HostFuture<'a, Vec<CommitSummary>> {
        Box::pin(async move {
            let path = format!("repos/{}/{}/commits", repo.owner, repo.name);
            let entries: Vec<CommitEntry> = self.get_paged(&path, &[("author", login)]).await?;
            Ok(entries
                .into_iter()
                .filter_map(|entry| {
                    let date = entry.date()?;
                    Some(CommitSummary {
                        sha: entry.sha,
                        date,
                    })
                })
                .collect())
        })
    }

    fn commit_stats<'a>(&'a self, repo: &'a RepoRef, sha: &'a str) -> HostFuture<'a, CommitStats> {
        Box::pin(async move {
            let url = self.endpoint(
                &format!("repos/{}/{}/commits/{sha}", repo.owner, repo.name),
                &[],
            )?;
            let commit: CommitResponse = self.get_json(url).await?;
            Ok(commit.stats.unwrap_or_default())
        })
    }

    fn rate_limit(&self) -> HostFuture<'_, RateLimitStatus> {
        Box::pin(async move {
            let url = self.endpoint("rate_limit", &[])?;
            let raw: RateLimitResponse = self.get_json(url).await?;
            Ok(raw.into())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    async fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::with_base_url(&server.uri(), Some("test-token".to_string())).unwrap()
    }

    #[tokio::test]
    async fn lists_contributors_across_pages() {
        let server = MockServer::start().await;
        let first: Vec<_> = (0..PER_PAGE).map(|i| json!({ "login": format!("user{i}") })).collect();
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contributors"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contributors"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "login": "last" }, { "type": "Anonymous" }])),
            )
            .mount(&server)
            .await;

        let logins = client(&server).await.list_contributors(&repo()).await.unwrap();
        assert_eq!(logins.len(), PER_PAGE + 1);
        assert_eq!(logins[0], "user0");
        assert_eq!(logins[PER_PAGE], "last");
    }

    #[tokio::test]
    async fn fetches_user_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": "octocat",
                "email": "octo@example.org",
                "location": "San Francisco",
                "company": "  "
            })))
            .mount(&server)
            .await;

        let contributor = client(&server).await.user_profile("octocat").await.unwrap();
        assert_eq!(contributor.username, "octocat");
        assert_eq!(contributor.email.as_deref(), Some("octo@example.org"));
        assert_eq!(contributor.location_signal(), "San Francisco");
        assert_eq!(contributor.organization_signal(), "Unknown");
    }

    #[tokio::test]
    async fn lists_commits_by_author() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits"))
            .and(query_param("author", "octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "sha": "b", "commit": { "author": { "date": "2024-03-02T10:00:00Z" } } },
                { "sha": "a", "commit": { "author": { "date": "2024-03-01T10:00:00Z" } } }
            ])))
            .mount(&server)
            .await;

        let commits = client(&server)
            .await
            .list_commits(&repo(), "octocat")
            .await
            .unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "b");
    }

    #[tokio::test]
    async fn fetches_commit_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "abc123",
                "stats": { "total": 12, "additions": 10, "deletions": 2 }
            })))
            .mount(&server)
            .await;

        let stats = client(&server)
            .await
            .commit_stats(&repo(), "abc123")
            .await
            .unwrap();
        assert_eq!(
            stats,
            CommitStats {
                additions: 10,
                deletions: 2
            }
        );
    }

    #[tokio::test]
    async fn forbidden_with_empty_budget_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "1700000000"),
            )
            .mount(&server)
            .await;

        let err = client(&server).await.user_profile("octocat").await.unwrap_err();
        assert!(matches!(
            err,
            GitHubError::RateLimited {
                reset: Some(1_700_000_000)
            }
        ));
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).await.rate_limit().await.unwrap_err();
        assert!(matches!(err, GitHubError::RateLimited { reset: None }));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server).await.user_profile("octocat").await.unwrap_err();
        assert!(matches!(err, GitHubError::Transient(_)));
    }

    #[tokio::test]
    async fn not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client(&server).await.user_profile("ghost").await.unwrap_err();
        assert!(matches!(err, GitHubError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).await.rate_limit().await.unwrap_err();
        assert!(matches!(err, GitHubError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn reads_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {
                    "core": { "limit": 5000, "remaining": 4321, "reset": 1700000000 },
                    "search": { "limit": 30, "remaining": 30, "reset": 1700000000 },
                    "graphql": { "limit": 5000, "remaining": 5000, "reset": 1700000000 }
                }
            })))
            .mount(&server)
            .await;

        let status = client(&server).await.rate_limit().await.unwrap();
        assert_eq!(status.core.remaining, 4321);
        assert!(status.graphql.is_some());
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = GitHubClient::with_base_url("http://localhost:1234/api/v3", None).unwrap();
        assert_eq!(
            client.endpoint("rate_limit", &[]).unwrap().as_str(),
            "http://localhost:1234/api/v3/rate_limit"
        );
    }
}
