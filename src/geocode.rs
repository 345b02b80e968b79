//! Free-text geocoding through the LocationIQ search API.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::settings::{get_env_var, LOCATIONIQ_KEY_VAR};
use crate::retrieval::{RetryClass, Retryable};

/// Public LocationIQ endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://us1.locationiq.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by a geocoder.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// No API key configured.
    #[error("LocationIQ API key not found. Set the LOCATIONIQ_API_KEY environment variable")]
    KeyNotFound,

    /// Quota exhausted.
    #[error("Geocoding rate limit exceeded")]
    RateLimited,

    /// Network failure or server-side error.
    #[error("Transient geocoding error: {0}")]
    Transient(String),

    /// Any other non-success status.
    #[error("Geocoding request failed: HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid geocoding response: {0}")]
    InvalidResponse(String),
}

impl Retryable for GeocodeError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited => RetryClass::RateLimited,
            Self::Transient(_) => RetryClass::Transient,
            Self::KeyNotFound | Self::Api { .. } | Self::InvalidResponse(_) => {
                RetryClass::Permanent
            }
        }
    }
}

/// Best match for a place query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeHit {
    /// Upper-case ISO country code.
    pub country_code: String,
    /// Full display name of the match.
    pub display_name: String,
}

/// Resolves free-text places to countries.
pub trait Geocoder: Send + Sync {
    /// Best match for `query`, or `None` when nothing matched.
    fn geocode<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<GeocodeHit>, GeocodeError>> + Send + 'a>>;
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    display_name: Option<String>,
    address: Option<SearchAddress>,
}

#[derive(Debug, Deserialize)]
struct SearchAddress {
    country_code: Option<String>,
}

/// LocationIQ search client.
#[derive(Debug, Clone)]
pub struct LocationIqClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl LocationIqClient {
    /// Creates a client for the public endpoint.
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_GEOCODER_URL, api_key)
    }

    /// Creates a client for the endpoint rooted at `base_url`.
    pub fn with_base_url(base_url: &str, api_key: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    /// Creates a client with the key from the environment or the settings
    /// file.
    pub fn from_env() -> anyhow::Result<Self> {
        let key = get_env_var(LOCATIONIQ_KEY_VAR).map_err(|_| GeocodeError::KeyNotFound)?;
        Self::new(key)
    }

    fn search_url(&self, query: &str) -> Result<Url, GeocodeError> {
        let mut url = self
            .base_url
            .join("v1/search.php")
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("addressdetails", "1");
        Ok(url)
    }

    async fn search(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        debug!(query = %query, "Sending geocoding request");
        let response = self
            .client
            .get(self.search_url(query)?)
            .send()
            .await
            .map_err(|e| GeocodeError::Transient(e.to_string()))?;

        let status = response.status();
        // LocationIQ answers 404 when nothing matched.
        if status == StatusCode::NOT_FOUND {
            debug!(query = %query, "No geocoding match");
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(GeocodeError::Transient(format!("HTTP {status}: {message}")));
            }
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        let hit = results.into_iter().next().and_then(|first| {
            let country_code = first.address?.country_code?.to_uppercase();
            Some(GeocodeHit {
                country_code,
                display_name: first.display_name.unwrap_or_default(),
            })
        });
        debug!(query = %query, hit = ?hit, "Geocoding response");
        Ok(hit)
    }
}

impl Geocoder for LocationIqClient {
    fn geocode<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<GeocodeHit>, GeocodeError>> + Send + 'a>> {
        Box::pin(self.search(query))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> LocationIqClient {
        LocationIqClient::with_base_url(&server.uri(), "secret".to_string()).unwrap()
    }

    #[tokio::test]
    async fn returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search.php"))
            .and(query_param("key", "secret"))
            .and(query_param("q", "Somerville"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "display_name": "Somerville, Middlesex County, Massachusetts, USA",
                    "address": { "country_code": "us" }
                },
                {
                    "display_name": "Somerville, Victoria, Australia",
                    "address": { "country_code": "au" }
                }
            ])))
            .mount(&server)
            .await;

        let hit = client(&server).await.geocode("Somerville").await.unwrap().unwrap();
        assert_eq!(hit.country_code, "US");
        assert!(hit.display_name.starts_with("Somerville"));
    }

    #[tokio::test]
    async fn not_found_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).await.geocode("Atlantis").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_country_code_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "display_name": "Somewhere" }
            ])))
            .mount(&server)
            .await;

        assert_eq!(client(&server).await.geocode("Somewhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn status_codes_map_to_error_classes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(matches!(
            client.geocode("busy").await,
            Err(GeocodeError::RateLimited)
        ));
        assert!(matches!(
            client.geocode("down").await,
            Err(GeocodeError::Transient(_))
        ));
        let err = client.geocode("denied").await.unwrap_err();
        assert_eq!(err.retry_class(), RetryClass::Permanent);
    }
}
