//! Weighted evidence fusion.
//!
//! Combines the profile, email and organization signals of one contributor
//! into a single country label and a confidence percentage using the fixed
//! linear model in [`ConfidenceWeights`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::gazetteer::Gazetteer;
use super::normalize::NormalizedPlace;
use super::{is_unknown, UNKNOWN};
use crate::config::ConfidenceWeights;

/// The three signals gathered for one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyEvidence {
    /// Country from the email domain's registration record, or `"Unknown"`.
    pub email_geo: String,
    /// Normalized profile location.
    pub profile_geo: NormalizedPlace,
    /// Declared organization geography, or `"Unknown"`.
    pub organization_geo: String,
}

/// Outcome of fusing one contributor's evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    /// Canonical country, or `"Unknown"`.
    pub final_location: String,
    /// Confidence in percent, within `[0, 100]`.
    pub confidence: f64,
}

impl FusionResult {
    /// The result when no signal is known.
    pub fn unknown() -> Self {
        Self {
            final_location: UNKNOWN.to_string(),
            confidence: 0.0,
        }
    }
}

/// Fuses geography evidence with fixed weights.
///
/// Both fields are immutable, so one engine can be shared by all workers.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    gazetteer: Arc<Gazetteer>,
    weights: ConfidenceWeights,
}

impl FusionEngine {
    /// Creates an engine over the given gazetteer and weights.
    pub fn new(gazetteer: Arc<Gazetteer>, weights: ConfidenceWeights) -> Self {
        Self { gazetteer, weights }
    }

    /// Returns the weights in use.
    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    /// Fuses one contributor's evidence.
    ///
    /// The profile signal is scaled by its match score. The email signal
    /// only counts when there is no profile signal, and a known email
    /// country that contradicts the profile costs the email weight. A known
    /// organization always adds its weight. The total is clamped to the sum
    /// of the weights and to 100.
    pub fn fuse(&self, evidence: &GeographyEvidence) -> FusionResult {
        let weights = &self.weights;
        let profile = &evidence.profile_geo;

        let email_country = self.gazetteer.canonical_or_raw(&evidence.email_geo);
        let organization_country = self.gazetteer.canonical_or_raw(&evidence.organization_geo);
        let profile_country = if profile.is_known() {
            let source = if is_unknown(&profile.country) {
                &profile.matched_place
            } else {
                &profile.country
            };
            self.gazetteer.canonical_or_raw(source)
        } else {
            UNKNOWN.to_string()
        };

        let profile_known = !is_unknown(&profile_country);
        let email_known = !is_unknown(&email_country);
        let organization_known = !is_unknown(&organization_country);

        let mut confidence = 0.0;

        let profile_contribution = if profile_known {
            f64::from(profile.score) / 100.0 * weights.profile * 100.0
        } else {
            0.0
        };
        confidence += profile_contribution;

        let email_contribution = if email_known && !profile_known {
            weights.email * 100.0
        } else {
            0.0
        };
        confidence += email_contribution;

        if email_known && profile_known && !email_country.eq_ignore_ascii_case(&profile_country) {
            let penalty = weights.email * 100.0;
            tracing::debug!(
                email = %email_country,
                profile = %profile_country,
                penalty,
                "Email and profile geography disagree"
            );
            confidence -= penalty;
        }

        if organization_known {
            confidence += weights.organization * 100.0;
        }

        let final_location = if profile_known {
            profile_country
        } else if email_known {
            email_country
        } else {
            UNKNOWN.to_string()
        };

        let confidence = confidence
            .max(0.0)
            .min(weights.max_confidence())
            .min(100.0);

        tracing::debug!(
            final_location = %final_location,
            confidence,
            profile_contribution,
            email_contribution,
            organization = %organization_country,
            "Fused geography evidence"
        );

        FusionResult {
            final_location,
            confidence,
        }
    }
}
