//! Geography inference: gazetteer, place normalization, evidence fusion
//! and denylist classification.

pub mod adversarial;
pub mod evidence;
pub mod fusion;
pub mod gazetteer;
pub mod normalize;

pub use adversarial::{classify, Denylist, DEFAULT_DENYLIST};
pub use evidence::{ContributorGeography, GeographyAnalyzer};
pub use fusion::{FusionEngine, FusionResult, GeographyEvidence};
pub use gazetteer::{CityEntry, Gazetteer};
pub use normalize::{MatchMethod, NormalizedPlace, PlaceNormalizer};

/// Placeholder for any signal that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Whether `value` is blank or the `"Unknown"` placeholder, ignoring case.
pub fn is_unknown(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN)
}
