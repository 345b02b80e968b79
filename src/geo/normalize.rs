//! Free-text location normalization.
//!
//! A declared location such as `"Greater London"`, `"Berln"` or
//! `"Somerville, MA, USA"` is mapped to a canonical place name and a match
//! score. Strategies are tried in order and the first hit wins:
//!
//! 1. direct lookup of the whole string, or of its leading city token, in
//!    the city table,
//! 2. fuzzy matching against the canonical place list (score > 80 only),
//! 3. structured `..., country` parsing of the last comma-separated token,
//! 4. country-code lookup of the whole string.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::gazetteer::{CityEntry, Gazetteer};
use super::{is_unknown, UNKNOWN};

/// Minimum fuzzy similarity, exclusive, for a match to count.
pub const FUZZY_THRESHOLD: u8 = 80;

/// Score of an exact hit.
pub const EXACT_SCORE: u8 = 100;

/// Well-known place names that users write but city tables rarely carry.
const KNOWN_PLACES: &[(&str, &str)] = &[
    ("New York City", "United States"),
    ("Los Angeles", "United States"),
    ("San Francisco", "United States"),
    ("Austin, Texas", "United States"),
    ("Silicon Valley", "United States"),
    ("Bay Area", "United States"),
    ("London", "United Kingdom"),
    ("Luxemburg", "Luxembourg"),
    ("Paris", "France"),
    ("Tokyo", "Japan"),
    ("Berlin", "Germany"),
    ("Chicago", "United States"),
    ("Houston", "United States"),
];

/// Qualifiers stripped off a location before retrying the city table.
const PREFIX_QUALIFIERS: &[&str] = &["greater ", "metro ", "downtown "];
const SUFFIX_QUALIFIERS: &[&str] = &[" city", " area", " metro", " metropolitan area"];

/// Which strategy produced a [`NormalizedPlace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Exact city-table hit.
    Direct,
    /// Similarity match above the threshold.
    Fuzzy,
    /// Comma-separated components resolved individually.
    Structured,
    /// Country-code hit, or no match at all.
    Fallback,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Fuzzy => "fuzzy",
            Self::Structured => "structured",
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Result of normalizing one location string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPlace {
    /// Canonical place name, or `"Unknown"`.
    pub matched_place: String,
    /// Match quality, 0–100. Zero exactly when nothing matched.
    pub score: u8,
    /// Strategy that produced the match.
    pub method: MatchMethod,
    /// The input as given.
    pub raw_input: String,
    /// Country the matched place lies in, or `"Unknown"`.
    pub country: String,
}

impl NormalizedPlace {
    /// The no-match result for `raw_input`.
    pub fn unknown(raw_input: &str) -> Self {
        Self {
            matched_place: UNKNOWN.to_string(),
            score: 0,
            method: MatchMethod::Fallback,
            raw_input: raw_input.to_string(),
            country: UNKNOWN.to_string(),
        }
    }

    fn hit(raw_input: &str, place: &str, country: &str, score: u8, method: MatchMethod) -> Self {
        Self {
            matched_place: place.to_string(),
            score,
            method,
            raw_input: raw_input.to_string(),
            country: country.to_string(),
        }
    }

    /// Whether a place was matched.
    pub fn is_known(&self) -> bool {
        !is_unknown(&self.matched_place)
    }
}

/// A fuzzy-matching candidate.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    key: String,
    country: String,
}

/// Maps free-text locations onto gazetteer places.
///
/// Holds only immutable data; [`normalize`](Self::normalize) is a pure
/// function and may be called from any number of workers at once.
#[derive(Debug, Clone)]
pub struct PlaceNormalizer {
    gazetteer: Arc<Gazetteer>,
    candidates: Vec<Candidate>,
}

impl PlaceNormalizer {
    /// Builds the canonical candidate list from the gazetteer.
    ///
    /// Candidate order is fixed (well-known places, then countries, then
    /// cities, each sorted) so ties always resolve the same way.
    pub fn new(gazetteer: Arc<Gazetteer>) -> Self {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut push = |name: &str, country: &str| {
            let key = comparison_key(name);
            if !candidates.iter().any(|c| c.key == key) {
                candidates.push(Candidate {
                    name: name.to_string(),
                    key,
                    country: country.to_string(),
                });
            }
        };

        for (name, country) in KNOWN_PLACES {
            // The city table wins so that direct and fuzzy hits agree.
            let country = match gazetteer.city(name) {
                Some(entry) => gazetteer.canonical_or_raw(&entry.country),
                None => gazetteer.canonical_or_raw(country),
            };
            push(name, &country);
        }
        for name in gazetteer.country_names() {
            push(name, name);
        }
        for city in gazetteer.cities() {
            let country = gazetteer.canonical_or_raw(&city.country);
            push(&city.name, &country);
        }

        Self {
            gazetteer,
            candidates,
        }
    }

    /// Normalizes a location string.
    pub fn normalize(&self, location: &str) -> NormalizedPlace {
        let trimmed = location.trim();
        if is_unknown(trimmed) {
            return NormalizedPlace::unknown(location);
        }

        let place = self
            .direct_match(location, trimmed)
            .or_else(|| self.fuzzy_match(location, trimmed))
            .or_else(|| self.structured_match(location, trimmed))
            .or_else(|| self.country_code_match(location, trimmed))
            .unwrap_or_else(|| NormalizedPlace::unknown(location));

        tracing::debug!(
            raw = %location,
            matched = %place.matched_place,
            score = place.score,
            method = %place.method,
            "Normalized place"
        );
        place
    }

    /// Looks up the whole string, then its leading city token, each with and
    /// without qualifiers.
    fn direct_match(&self, raw: &str, trimmed: &str) -> Option<NormalizedPlace> {
        let city_token = trimmed
            .split_once(',')
            .map(|(city, _)| city.trim())
            .filter(|city| !city.is_empty());
        let entry = self
            .city_lookup(trimmed)
            .or_else(|| city_token.and_then(|city| self.city_lookup(city)))?;
        let country = self.gazetteer.canonical_or_raw(&entry.country);
        Some(NormalizedPlace::hit(
            raw,
            &entry.name,
            &country,
            EXACT_SCORE,
            MatchMethod::Direct,
        ))
    }

    fn city_lookup(&self, name: &str) -> Option<&CityEntry> {
        self.gazetteer
            .city(name)
            .or_else(|| strip_qualifiers(name).and_then(|city| self.gazetteer.city(&city)))
    }

    fn fuzzy_match(&self, raw: &str, trimmed: &str) -> Option<NormalizedPlace> {
        let key = comparison_key(trimmed);
        let mut best: Option<(&Candidate, u8)> = None;
        for candidate in &self.candidates {
            let score = similarity(&key, &candidate.key);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
            if score == EXACT_SCORE {
                break;
            }
        }

        let (candidate, score) = best?;
        if score <= FUZZY_THRESHOLD {
            tracing::debug!(
                raw = %raw,
                best = %candidate.name,
                score,
                "Fuzzy match below threshold"
            );
            return None;
        }
        Some(NormalizedPlace::hit(
            raw,
            &candidate.name,
            &candidate.country,
            score,
            MatchMethod::Fuzzy,
        ))
    }

    fn structured_match(&self, raw: &str, trimmed: &str) -> Option<NormalizedPlace> {
        let parts: Vec<&str> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        // A leading city in the table was already taken by the direct step.
        let [_, .., last] = parts.as_slice() else {
            return None;
        };
        let country = self.gazetteer.canonical_country(last)?;
        Some(NormalizedPlace::hit(
            raw,
            &country,
            &country,
            EXACT_SCORE,
            MatchMethod::Structured,
        ))
    }

    fn country_code_match(&self, raw: &str, trimmed: &str) -> Option<NormalizedPlace> {
        let name = self.gazetteer.country_by_code(trimmed)?;
        Some(NormalizedPlace::hit(
            raw,
            name,
            name,
            EXACT_SCORE,
            MatchMethod::Fallback,
        ))
    }
}

/// Lowercases and collapses whitespace.
fn comparison_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Removes a leading or trailing qualifier such as "Greater" or "Area".
fn strip_qualifiers(s: &str) -> Option<String> {
    let lowered = comparison_key(s);
    let mut stripped = lowered.as_str();
    for prefix in PREFIX_QUALIFIERS {
        if let Some(rest) = stripped.strip_prefix(prefix) {
            stripped = rest;
        }
    }
    for suffix in SUFFIX_QUALIFIERS {
        if let Some(rest) = stripped.strip_suffix(suffix) {
            stripped = rest;
        }
    }
    let stripped = stripped.trim();
    (stripped != lowered && !stripped.is_empty()).then(|| stripped.to_string())
}

/// Levenshtein ratio, 0–100, taking the better of the plain and the
/// token-sorted comparison so that word order does not matter.
fn similarity(a: &str, b: &str) -> u8 {
    let plain = strsim::normalized_levenshtein(a, b);
    let sorted = strsim::normalized_levenshtein(&token_sort(a), &token_sort(b));
    (plain.max(sorted) * 100.0).round() as u8
}

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::geo::gazetteer::tests::sample_gazetteer;
    use proptest::prelude::*;

    fn normalizer() -> PlaceNormalizer {
        PlaceNormalizer::new(Arc::new(sample_gazetteer()))
    }

    #[test]
    fn unknown_and_empty_fall_back() {
        let n = normalizer();
        for input in ["Unknown", "unknown", "", "   "] {
            let place = n.normalize(input);
            assert_eq!(place.matched_place, "Unknown");
            assert_eq!(place.score, 0);
            assert_eq!(place.method, MatchMethod::Fallback);
        }
    }

    #[test]
    fn direct_match_is_case_insensitive() {
        let place = normalizer().normalize("new york city");
        assert_eq!(place.matched_place, "New York City");
        assert_eq!(place.country, "United States");
        assert_eq!(place.score, 100);
        assert_eq!(place.method, MatchMethod::Direct);
        assert_eq!(place.raw_input, "new york city");
    }

    #[test]
    fn direct_match_strips_qualifiers() {
        let place = normalizer().normalize("Greater London Area");
        assert_eq!(place.matched_place, "London");
        assert_eq!(place.method, MatchMethod::Direct);
    }

    #[test]
    fn fuzzy_match_corrects_typos() {
        let place = normalizer().normalize("Berln");
        assert_eq!(place.matched_place, "Berlin");
        assert_eq!(place.country, "Germany");
        assert_eq!(place.method, MatchMethod::Fuzzy);
        assert!(place.score > FUZZY_THRESHOLD);
    }

    #[test]
    fn fuzzy_match_known_places() {
        let place = normalizer().normalize("bay area");
        assert_eq!(place.matched_place, "Bay Area");
        assert_eq!(place.country, "United States");
        assert_eq!(place.method, MatchMethod::Fuzzy);
        assert_eq!(place.score, 100);
    }

    #[test]
    fn weak_similarity_is_not_a_match() {
        let place = normalizer().normalize("Middle of nowhere");
        assert_eq!(place.matched_place, "Unknown");
        assert_eq!(place.score, 0);
    }

    #[test]
    fn leading_city_token_matches_directly() {
        let n = normalizer();
        for (input, city, country) in [
            ("Munich, Bavaria", "Munich", "Germany"),
            ("Paris, France", "Paris", "France"),
            ("Austin, Texas", "Austin", "United States"),
            ("Berlin, Brandenburg, Europe", "Berlin", "Germany"),
            ("Tokyo, Kanto, Earth", "Tokyo", "Japan"),
            ("Greater London, England", "London", "United Kingdom"),
        ] {
            let place = n.normalize(input);
            assert_eq!(place.matched_place, city, "input {input}");
            assert_eq!(place.country, country, "input {input}");
            assert_eq!(place.method, MatchMethod::Direct, "input {input}");
            assert_eq!(place.score, 100, "input {input}");
        }
    }

    #[test]
    fn structured_two_parts_resolves_trailing_country() {
        let place = normalizer().normalize("Springfield, USA");
        assert_eq!(place.matched_place, "United States");
        assert_eq!(place.method, MatchMethod::Structured);
    }

    #[test]
    fn structured_many_parts_resolves_country() {
        let place = normalizer().normalize("Somerville, MA, USA");
        assert_eq!(place.matched_place, "United States");
        assert_eq!(place.country, "United States");
        assert_eq!(place.method, MatchMethod::Structured);
    }

    #[test]
    fn structured_two_parts_with_unknown_city_misses() {
        let place = normalizer().normalize("Springfield, Illinois");
        assert_eq!(place.matched_place, "Unknown");
    }

    #[test]
    fn country_code_fallback() {
        let place = normalizer().normalize("FR");
        assert_eq!(place.matched_place, "France");
        assert_eq!(place.method, MatchMethod::Fallback);
        assert_eq!(place.score, 100);
    }

    #[test]
    fn normalize_is_idempotent_on_examples() {
        let n = normalizer();
        for input in [
            "Greater London",
            "Berln",
            "Austin, Texas",
            "Somerville, MA, USA",
            "Munich, Bavaria",
            "DE",
            "tokyo",
        ] {
            let first = n.normalize(input);
            assert!(first.is_known(), "{input} should match");
            let second = n.normalize(&first.matched_place);
            assert_eq!(second.matched_place, first.matched_place, "input {input}");
            assert_eq!(second.country, first.country, "input {input}");
        }
    }

    #[test]
    fn known_places_follow_city_table_country() {
        let gazetteer = Gazetteer::from_tables(
            [
                ("CA".to_string(), "Canada".to_string()),
                ("GB".to_string(), "United Kingdom".to_string()),
            ],
            [CityEntry {
                name: "London".to_string(),
                country: "Canada".to_string(),
                state: Some("Ontario".to_string()),
            }],
        );
        let n = PlaceNormalizer::new(Arc::new(gazetteer));

        let direct = n.normalize("London");
        let fuzzy = n.normalize("Londn");
        assert_eq!(direct.method, MatchMethod::Direct);
        assert_eq!(fuzzy.method, MatchMethod::Fuzzy);
        assert_eq!(fuzzy.matched_place, "London");
        assert_eq!(direct.country, "Canada");
        assert_eq!(fuzzy.country, "Canada");
    }

    #[test]
    fn strip_qualifiers_only_when_changed() {
        assert_eq!(strip_qualifiers("Greater Boston").as_deref(), Some("boston"));
        assert_eq!(strip_qualifiers("Boston"), None);
        assert_eq!(strip_qualifiers("City"), None);
    }

    #[test]
    fn similarity_ignores_word_order() {
        assert_eq!(similarity("francisco san", "san francisco"), 100);
    }

    proptest! {
        #[test]
        fn score_never_weak_positive(s in "[a-zA-Z ,]{0,30}") {
            let place = normalizer().normalize(&s);
            if place.is_known() {
                prop_assert!(place.score > FUZZY_THRESHOLD);
            } else {
                prop_assert_eq!(place.score, 0);
            }
        }

        #[test]
        fn normalize_deterministic(s in "[a-zA-Z ,]{0,30}") {
            let n = normalizer();
            prop_assert_eq!(n.normalize(&s), n.normalize(&s));
        }

        #[test]
        fn normalize_idempotent(s in "[a-zA-Z ,]{0,30}") {
            let n = normalizer();
            let first = n.normalize(&s);
            if first.is_known() {
                let second = n.normalize(&first.matched_place);
                prop_assert_eq!(second.matched_place, first.matched_place);
                prop_assert_eq!(second.country, first.country);
            }
        }
    }
}
