//! Denylist classification of fused locations.

use std::collections::HashSet;

use super::fusion::FusionResult;
use super::gazetteer::Gazetteer;

/// Countries flagged by default.
pub const DEFAULT_DENYLIST: &[&str] = &["China", "Iran", "North Korea", "Cuba", "Venezuela", "Russia"];

/// A fixed set of country names, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    entries: HashSet<String>,
}

impl Denylist {
    /// Builds a denylist from names as given.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = names
            .into_iter()
            .map(|name| fold(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { entries }
    }

    /// Builds a denylist whose entries also include their gazetteer-canonical
    /// form, so `"Russian Federation"` matches a fused `"Russia"`.
    pub fn canonicalized<I, S>(names: I, gazetteer: &Gazetteer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = HashSet::new();
        for name in names {
            let name = name.as_ref();
            if let Some(canonical) = gazetteer.canonical_country(name) {
                entries.insert(fold(&canonical));
            }
            let folded = fold(name);
            if !folded.is_empty() {
                entries.insert(folded);
            }
        }
        Self { entries }
    }

    /// The default denylist, canonicalized through `gazetteer`.
    pub fn default_for(gazetteer: &Gazetteer) -> Self {
        Self::canonicalized(DEFAULT_DENYLIST, gazetteer)
    }

    /// Whether `country` is on the list, ignoring case and surrounding
    /// whitespace. No partial matches.
    pub fn contains(&self, country: &str) -> bool {
        self.entries.contains(&fold(country))
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether a fused location falls on the denylist.
pub fn classify(result: &FusionResult, denylist: &Denylist) -> bool {
    denylist.contains(&result.final_location)
}
