//! Email → domain → registration country/organization.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::dns::MxResolver;
use super::registration::{LookupError, RegistrationLookup};
use crate::geo::UNKNOWN;
use crate::retrieval::{retry, RetrievalError, RetryPolicy};

/// Consumer mail providers. Their registration data says nothing about the
/// user, so they are never looked up.
pub const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "aol.com",
    "icloud.com",
    "mail.com",
    "protonmail.com",
];

/// Wall-clock budget of one lookup attempt.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Registration lookup attempts.
pub const LOOKUP_ATTEMPTS: u32 = 3;

/// Delay between registration lookup attempts.
pub const LOOKUP_RETRY_DELAY: Duration = Duration::from_secs(2);

/// What is known about an email domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Lower-cased domain, empty when none could be extracted.
    pub domain: String,
    /// Registrant country as published, or `"Unknown"`.
    pub country: String,
    /// Registrant organization, or `"Unknown"`.
    pub organization: String,
    /// Mail exchangers, most preferred first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mx_records: Vec<String>,
    /// Set when cancellation abandoned the registration lookup, so the
    /// unknown fields may be incomplete rather than unpublished.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
}

impl DomainInfo {
    /// A result carrying no information about `domain`.
    pub fn unknown(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            country: UNKNOWN.to_string(),
            organization: UNKNOWN.to_string(),
            mx_records: Vec::new(),
            interrupted: false,
        }
    }
}

/// Lower-cased domain part of `email`. Input without `@` is taken as a bare
/// domain.
pub fn extract_domain(email: &str) -> String {
    let trimmed = email.trim();
    let domain = trimmed.rsplit_once('@').map_or(trimmed, |(_, domain)| domain);
    domain.trim().trim_end_matches('.').to_lowercase()
}

/// Whether `domain` belongs to a consumer mail provider.
pub fn is_free_mail(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&domain.trim().to_lowercase().as_str())
}

/// Resolves email domains to registration geography.
///
/// Every lookup is best-effort: [`resolve`](Self::resolve) never fails and
/// fills anything it could not learn with `"Unknown"`.
#[derive(Clone)]
pub struct DomainResolver {
    registration: Arc<dyn RegistrationLookup>,
    mx: Arc<dyn MxResolver>,
    policy: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DomainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResolver")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DomainResolver {
    /// Creates a resolver with the default attempt budget and timeout.
    pub fn new(registration: Arc<dyn RegistrationLookup>, mx: Arc<dyn MxResolver>) -> Self {
        Self {
            registration,
            mx,
            policy: RetryPolicy::fixed(LOOKUP_ATTEMPTS, LOOKUP_RETRY_DELAY),
            timeout: LOOKUP_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the registration retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abandons pending retries when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolves the domain of `email`.
    pub async fn resolve(&self, email: &str) -> DomainInfo {
        let domain = extract_domain(email);
        if domain.is_empty() {
            debug!(email = %email, "No domain to resolve");
            return DomainInfo::unknown(domain);
        }
        if is_free_mail(&domain) {
            debug!(domain = %domain, "Skipping free-mail domain");
            return DomainInfo::unknown(domain);
        }

        let mx_records = self.mail_exchangers(&domain).await;

        let mut info = DomainInfo::unknown(domain.clone());
        info.mx_records = mx_records;

        let timeout = self.timeout;
        let registration = &self.registration;
        let target = domain.as_str();
        let (result, attempts) = retry(&self.policy, &self.cancel, target, || async move {
            tokio::time::timeout(timeout, registration.lookup(target))
                .await
                .unwrap_or(Err(LookupError::Timeout(timeout)))
        })
        .await;

        match result {
            Ok(record) => {
                debug!(
                    domain = %domain,
                    attempts,
                    country = ?record.country,
                    organization = ?record.organization,
                    "Resolved domain registration"
                );
                if let Some(country) = record.country {
                    info.country = country;
                }
                if let Some(organization) = record.organization {
                    info.organization = organization;
                }
            }
            Err(RetrievalError::Cancelled { .. }) => {
                debug!(domain = %domain, attempts, "Registration lookup abandoned");
                info.interrupted = true;
            }
            Err(e) => {
                warn!(domain = %domain, attempts, "Registration lookup failed: {e}");
            }
        }
        info
    }

    async fn mail_exchangers(&self, domain: &str) -> Vec<String> {
        match tokio::time::timeout(self.timeout, self.mx.mail_exchangers(domain)).await {
            Ok(Ok(records)) => {
                debug!(domain = %domain, mx = ?records, "Resolved mail exchangers");
                records
            }
            Ok(Err(e)) => {
                debug!(domain = %domain, "MX lookup failed: {e}");
                Vec::new()
            }
            Err(_) => {
                debug!(domain = %domain, "MX lookup timed out");
                Vec::new()
            }
        }
    }
}
