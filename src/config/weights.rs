//! Confidence weights for evidence fusion.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default weight of the declared profile location.
pub const DEFAULT_PROFILE_WEIGHT: f64 = 0.4;

/// Default weight of the email-domain registration country.
pub const DEFAULT_EMAIL_WEIGHT: f64 = 0.3;

/// Default weight of the declared organization.
pub const DEFAULT_ORGANIZATION_WEIGHT: f64 = 0.3;

/// Fixed weights of the linear confidence model.
///
/// Loaded once at start-up and passed by value into the fusion engine;
/// nothing mutates it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Weight of the normalized profile location.
    #[serde(rename = "profile_geo_weight", default = "default_profile")]
    pub profile: f64,
    /// Weight of the email-domain country.
    #[serde(rename = "email_geo_weight", default = "default_email")]
    pub email: f64,
    /// Weight of the organization geography.
    #[serde(rename = "organization_geo_weight", default = "default_organization")]
    pub organization: f64,
}

fn default_profile() -> f64 {
    DEFAULT_PROFILE_WEIGHT
}

fn default_email() -> f64 {
    DEFAULT_EMAIL_WEIGHT
}

fn default_organization() -> f64 {
    DEFAULT_ORGANIZATION_WEIGHT
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE_WEIGHT,
            email: DEFAULT_EMAIL_WEIGHT,
            organization: DEFAULT_ORGANIZATION_WEIGHT,
        }
    }
}

impl ConfidenceWeights {
    /// Creates weights after checking each lies in `[0, 1]`.
    pub fn new(profile: f64, email: f64, organization: f64) -> Result<Self, ConfigError> {
        let weights = Self {
            profile,
            email,
            organization,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Loads weights from a JSON file. Missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let weights: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        weights.validate()?;

        tracing::debug!(
            profile = weights.profile,
            email = weights.email,
            organization = weights.organization,
            "Loaded confidence weights from {}",
            path.display()
        );
        Ok(weights)
    }

    /// Upper bound of the fused confidence, in percent.
    pub fn max_confidence(&self) -> f64 {
        (self.profile + self.email + self.organization) * 100.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("profile_geo_weight", self.profile),
            ("email_geo_weight", self.email),
            ("organization_geo_weight", self.organization),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange { field, value });
            }
        }
        Ok(())
    }
}
