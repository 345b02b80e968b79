//! Contributor records consumed by the analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::UNKNOWN;

/// A repository contributor as seen by the analysis.
///
/// Optional fields come straight from the hosting service; blank values
/// are treated as absent. Geography signals read through the `*_signal`
/// accessors, which resolve absent values to `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Login name.
    pub username: String,
    /// Public email address.
    pub email: Option<String>,
    /// Free-text location from the profile.
    pub declared_location: Option<String>,
    /// Free-text company or organization from the profile.
    pub declared_organization: Option<String>,
}

impl Contributor {
    /// Creates a contributor with only a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            declared_location: None,
            declared_organization: None,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = non_blank(email.into());
        self
    }

    /// Sets the declared location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.declared_location = non_blank(location.into());
        self
    }

    /// Sets the declared organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.declared_organization = non_blank(organization.into());
        self
    }

    /// Declared location, or `"Unknown"`.
    pub fn location_signal(&self) -> &str {
        signal(self.declared_location.as_deref())
    }

    /// Declared organization, or `"Unknown"`.
    pub fn organization_signal(&self) -> &str {
        signal(self.declared_organization.as_deref())
    }

    /// Email address if it looks like one (`local@domain`).
    pub fn email_address(&self) -> Option<&str> {
        let email = self.email.as_deref()?.trim();
        let (local, domain) = email.rsplit_once('@')?;
        (!local.is_empty() && !domain.is_empty()).then_some(email)
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

fn signal(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
}

pub(crate) fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
