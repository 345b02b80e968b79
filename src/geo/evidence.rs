//! Per-contributor evidence gathering and fusion.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::adversarial::{classify, Denylist};
use super::fusion::{FusionEngine, FusionResult, GeographyEvidence};
use super::gazetteer::Gazetteer;
use super::normalize::{MatchMethod, NormalizedPlace, PlaceNormalizer, EXACT_SCORE};
use super::UNKNOWN;
use crate::config::ReferenceData;
use crate::contributor::Contributor;
use crate::domain::{DomainInfo, DomainResolver};
use crate::geocode::Geocoder;
use crate::retrieval::{retry, RetrievalError, RetryPolicy};

/// Geocoding attempts per profile location.
const GEOCODE_ATTEMPTS: u32 = 3;

/// Delay between geocoding attempts.
const GEOCODE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Everything inferred about one contributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorGeography {
    /// The contributor analysed.
    pub contributor: Contributor,
    /// Email-domain resolution, when the contributor has an email address.
    pub domain: Option<DomainInfo>,
    /// Signals fed into fusion.
    pub evidence: GeographyEvidence,
    /// Fused location and confidence.
    pub fusion: FusionResult,
    /// Whether the fused location is on the denylist.
    pub flagged: bool,
    /// Whether cancellation cut a lookup short, leaving signals that may be
    /// missing rather than absent.
    #[serde(default)]
    pub interrupted: bool,
}

/// Gathers and fuses geography evidence for contributors.
///
/// Cheap to clone; every component is shared read-only.
#[derive(Clone)]
pub struct GeographyAnalyzer {
    gazetteer: Arc<Gazetteer>,
    normalizer: Arc<PlaceNormalizer>,
    fusion: Arc<FusionEngine>,
    resolver: DomainResolver,
    denylist: Arc<Denylist>,
    geocoder: Option<Arc<dyn Geocoder>>,
    geocode_policy: RetryPolicy,
    cancel: CancellationToken,
}

impl std::fmt::Debug for GeographyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeographyAnalyzer")
            .field("weights", self.fusion.weights())
            .field("denylist_len", &self.denylist.len())
            .field("geocoding", &self.geocoder.is_some())
            .finish_non_exhaustive()
    }
}

impl GeographyAnalyzer {
    /// Creates an analyzer over loaded reference data.
    pub fn new(data: &ReferenceData, resolver: DomainResolver, denylist: Denylist) -> Self {
        Self {
            gazetteer: Arc::clone(&data.gazetteer),
            normalizer: Arc::new(PlaceNormalizer::new(Arc::clone(&data.gazetteer))),
            fusion: Arc::new(FusionEngine::new(Arc::clone(&data.gazetteer), data.weights)),
            resolver,
            denylist: Arc::new(denylist),
            geocoder: None,
            geocode_policy: RetryPolicy::fixed(GEOCODE_ATTEMPTS, GEOCODE_RETRY_DELAY),
            cancel: CancellationToken::new(),
        }
    }

    /// Consults `geocoder` for profile locations the normalizer cannot place.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Overrides the geocoding retry policy.
    #[must_use]
    pub fn with_geocode_policy(mut self, policy: RetryPolicy) -> Self {
        self.geocode_policy = policy;
        self
    }

    /// Abandons pending geocoding retries when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The place normalizer in use.
    pub fn normalizer(&self) -> &PlaceNormalizer {
        &self.normalizer
    }

    /// Infers the geography of `contributor`.
    ///
    /// Domain resolution completes before fusion. Lookup failures degrade
    /// the affected signal to `"Unknown"`; this never fails.
    pub async fn identify(&self, contributor: &Contributor) -> ContributorGeography {
        let domain = match contributor.email_address() {
            Some(email) => Some(self.resolver.resolve(email).await),
            None => None,
        };
        let email_geo = domain
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |info| info.country.clone());

        let mut interrupted = domain.as_ref().is_some_and(|info| info.interrupted);

        let location = contributor.location_signal();
        let mut profile_geo = self.normalizer.normalize(location);
        if !profile_geo.is_known() && contributor.declared_location.is_some() {
            match self.geocode(location).await {
                Ok(Some(place)) => profile_geo = place,
                Ok(None) => {}
                Err(()) => interrupted = true,
            }
        }

        let evidence = GeographyEvidence {
            email_geo,
            profile_geo,
            organization_geo: contributor.organization_signal().to_string(),
        };
        let fusion = self.fusion.fuse(&evidence);
        let flagged = classify(&fusion, &self.denylist);

        debug!(
            contributor = %contributor,
            email_geo = %evidence.email_geo,
            profile = %evidence.profile_geo.matched_place,
            score = evidence.profile_geo.score,
            method = %evidence.profile_geo.method,
            final_location = %fusion.final_location,
            confidence = fusion.confidence,
            flagged,
            interrupted,
            "Identified contributor geography"
        );

        ContributorGeography {
            contributor: contributor.clone(),
            domain,
            evidence,
            fusion,
            flagged,
            interrupted,
        }
    }

    /// Geocodes `location`. Failures and misses yield `Ok(None)`; `Err` means
    /// cancellation abandoned the retries.
    async fn geocode(&self, location: &str) -> Result<Option<NormalizedPlace>, ()> {
        let Some(geocoder) = self.geocoder.as_deref() else {
            return Ok(None);
        };
        let (result, attempts) = retry(&self.geocode_policy, &self.cancel, location, || {
            geocoder.geocode(location)
        })
        .await;

        let hit = match result {
            Ok(Some(hit)) => hit,
            Ok(None) => return Ok(None),
            Err(RetrievalError::Cancelled { .. }) => {
                debug!(location = %location, attempts, "Geocoding abandoned");
                return Err(());
            }
            Err(e) => {
                warn!(location = %location, attempts, "Geocoding failed: {e}");
                return Ok(None);
            }
        };

        let Some(country) = self.gazetteer.canonical_country(&hit.country_code) else {
            return Ok(None);
        };
        debug!(
            location = %location,
            display_name = %hit.display_name,
            country = %country,
            "Geocoded profile location"
        );
        Ok(Some(NormalizedPlace {
            matched_place: country.clone(),
            score: EXACT_SCORE,
            method: MatchMethod::Fallback,
            raw_input: location.to_string(),
            country,
        }))
    }
}
