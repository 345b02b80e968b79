//! MX record lookups. Used for diagnostics only.

use std::future::Future;
use std::pin::Pin;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use super::registration::LookupError;

/// Resolves the mail exchangers of a domain.
pub trait MxResolver: Send + Sync {
    /// Mail-exchanger hostnames, most preferred first.
    fn mail_exchangers<'a>(
        &'a self,
        domain: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LookupError>> + Send + 'a>>;
}

/// MX lookups through an async DNS resolver.
pub struct DnsMxLookup {
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for DnsMxLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsMxLookup").finish_non_exhaustive()
    }
}

impl Default for DnsMxLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsMxLookup {
    /// Creates a resolver with the default upstream configuration.
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

impl MxResolver for DnsMxLookup {
    fn mail_exchangers<'a>(
        &'a self,
        domain: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LookupError>> + Send + 'a>> {
        Box::pin(async move {
            let answer = self
                .resolver
                .mx_lookup(domain)
                .await
                .map_err(|e| LookupError::Failed(e.to_string()))?;

            let mut records: Vec<(u16, String)> = answer
                .iter()
                .map(|mx| {
                    let host = mx.exchange().to_utf8();
                    (mx.preference(), host.trim_end_matches('.').to_string())
                })
                .collect();
            records.sort();
            Ok(records.into_iter().map(|(_, host)| host).collect())
        })
    }
}
