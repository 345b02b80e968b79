//! Domain registration (WHOIS) lookups.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use whois_rust::{WhoIs, WhoIsLookupOptions};

use crate::retrieval::{RetryClass, Retryable};

/// Root WHOIS servers by top-level domain. The empty key is the fallback;
/// lookups follow registrar referrals from there. `whois-rust` requires the
/// `_` entry for IP queries.
const WHOIS_SERVERS: &str = r#"{
    "_": { "ip": { "host": "whois.arin.net", "query": "n + $addr\r\n" } },
    "com": "whois.verisign-grs.com",
    "net": "whois.verisign-grs.com",
    "org": "whois.pir.org",
    "io": "whois.nic.io",
    "dev": "whois.nic.google",
    "de": "whois.denic.de",
    "uk": "whois.nic.uk",
    "fr": "whois.nic.fr",
    "cn": "whois.cnnic.cn",
    "ru": "whois.tcinet.ru",
    "jp": "whois.jprs.jp",
    "": "whois.iana.org"
}"#;

/// Values registrars publish in place of withheld data.
const PLACEHOLDERS: &[&str] = &[
    "redacted",
    "privacy",
    "data protected",
    "not disclosed",
    "withheld",
    "statutory masking",
    "gdpr masked",
];

/// Placeholder values that only count on an exact match.
const EXACT_PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "-"];

/// Which registration field a pattern extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Country,
    Organization,
}

/// Patterns in priority order: registrant fields before generic ones.
const FIELD_PATTERNS: &[(Field, &str)] = &[
    (Field::Country, r"(?im)^\s*Registrant Country\s*:\s*(.+?)\s*$"),
    (Field::Country, r"(?im)^\s*Country\s*:\s*(.+?)\s*$"),
    (Field::Organization, r"(?im)^\s*Registrant Organi[sz]ation\s*:\s*(.+?)\s*$"),
    (Field::Organization, r"(?im)^\s*(?:org|OrgName|Organi[sz]ation)\s*:\s*(.+?)\s*$"),
];

static COMPILED_PATTERNS: LazyLock<Vec<(Field, Regex)>> = LazyLock::new(|| {
    FIELD_PATTERNS
        .iter()
        .filter_map(|(field, pattern)| Regex::new(pattern).ok().map(|regex| (*field, regex)))
        .collect()
});

/// Why a lookup failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The call exceeded its wall-clock budget.
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    /// The server or the network failed.
    #[error("lookup failed: {0}")]
    Failed(String),

    /// The domain cannot be looked up at all.
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}

impl Retryable for LookupError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout(_) | Self::Failed(_) => RetryClass::Transient,
            Self::InvalidDomain(_) => RetryClass::Permanent,
        }
    }
}

/// Country and organization published for a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Registrant country as published (name or code).
    pub country: Option<String>,
    /// Registrant organization.
    pub organization: Option<String>,
}

/// Looks up the registration record of a domain.
pub trait RegistrationLookup: Send + Sync {
    /// Fetches and parses the record for `domain`.
    fn lookup<'a>(
        &'a self,
        domain: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RegistrationRecord, LookupError>> + Send + 'a>>;
}

/// Registration lookup over the WHOIS protocol.
///
/// The `whois-rust` client is blocking, so each query runs on the blocking
/// pool.
#[derive(Clone)]
pub struct WhoisLookup {
    whois: Arc<WhoIs>,
}

impl std::fmt::Debug for WhoisLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhoisLookup").finish_non_exhaustive()
    }
}

impl WhoisLookup {
    /// Creates a client with the built-in root server table.
    pub fn new() -> anyhow::Result<Self> {
        let whois = WhoIs::from_string(WHOIS_SERVERS)
            .map_err(|e| anyhow::anyhow!("Failed to create WHOIS client: {e}"))?;
        Ok(Self {
            whois: Arc::new(whois),
        })
    }

    async fn query(&self, domain: &str) -> Result<String, LookupError> {
        let options = WhoIsLookupOptions::from_string(domain)
            .map_err(|e| LookupError::InvalidDomain(format!("{domain}: {e}")))?;
        let whois = Arc::clone(&self.whois);

        match tokio::task::spawn_blocking(move || whois.lookup(options)).await {
            Ok(Ok(text)) => {
                debug!(domain = %domain, len = text.len(), "WHOIS lookup succeeded");
                Ok(text)
            }
            Ok(Err(e)) => Err(LookupError::Failed(e.to_string())),
            Err(e) => Err(LookupError::Failed(format!("WHOIS task failed: {e}"))),
        }
    }
}

impl RegistrationLookup for WhoisLookup {
    fn lookup<'a>(
        &'a self,
        domain: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RegistrationRecord, LookupError>> + Send + 'a>> {
        Box::pin(async move {
            let text = self.query(domain).await?;
            Ok(parse_registration(&text))
        })
    }
}

/// Extracts registrant country and organization from WHOIS text.
///
/// The first non-placeholder value of each field wins. Missing or withheld
/// fields stay `None`.
pub fn parse_registration(text: &str) -> RegistrationRecord {
    let mut record = RegistrationRecord::default();
    for (field, regex) in COMPILED_PATTERNS.iter() {
        let slot = match field {
            Field::Country => &mut record.country,
            Field::Organization => &mut record.organization,
        };
        if slot.is_some() {
            continue;
        }
        *slot = regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|value| !is_placeholder(value))
            .map(str::to_string);
    }
    record
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty()
        || EXACT_PLACEHOLDERS.contains(&lowered.as_str())
        || PLACEHOLDERS.iter().any(|p| lowered.contains(p))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_registrant_fields() {
        let text = "Domain Name: EXAMPLE.DE\n\
                    Registrant Organization: Beispiel GmbH\n\
                    Registrant Country: DE\n";
        let record = parse_registration(text);
        assert_eq!(record.country.as_deref(), Some("DE"));
        assert_eq!(record.organization.as_deref(), Some("Beispiel GmbH"));
    }

    #[test]
    fn registrant_fields_take_priority() {
        let text = "Country: US\nRegistrant Country: FR\norg: Registrar Inc\n";
        let record = parse_registration(text);
        assert_eq!(record.country.as_deref(), Some("FR"));
        assert_eq!(record.organization.as_deref(), Some("Registrar Inc"));
    }

    #[test]
    fn placeholders_are_absent() {
        let text = "Registrant Organization: REDACTED FOR PRIVACY\n\
                    Registrant Country: Data Protected\n";
        assert_eq!(parse_registration(text), RegistrationRecord::default());
    }

    #[test]
    fn placeholder_falls_through_to_generic_field() {
        let text = "Registrant Country: REDACTED FOR PRIVACY\ncountry: JP\n";
        assert_eq!(parse_registration(text).country.as_deref(), Some("JP"));
    }

    #[test]
    fn empty_text_yields_empty_record() {
        assert_eq!(parse_registration(""), RegistrationRecord::default());
    }

    #[test]
    fn lookup_error_classes() {
        assert_eq!(
            LookupError::Timeout(Duration::from_secs(10)).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            LookupError::Failed("reset".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            LookupError::InvalidDomain("x".into()).retry_class(),
            RetryClass::Permanent
        );
    }

    #[test]
    fn whois_client_builds() {
        let lookup = WhoisLookup::new();
        assert!(lookup.is_ok(), "{:?}", lookup.err());
    }

    #[test]
    fn server_table_is_valid_json_with_ip_entry() {
        let table: serde_json::Value = serde_json::from_str(WHOIS_SERVERS).unwrap();
        assert_eq!(table["_"]["ip"]["host"], "whois.arin.net");
        assert_eq!(table["com"], "whois.verisign-grs.com");
    }
}
