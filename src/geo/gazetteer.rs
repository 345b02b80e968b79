//! In-memory gazetteer built from the country-code and world-cities tables.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::ConfigError;

use super::is_unknown;

/// Alternate spellings mapped to the English short names the tables use.
///
/// Registration records and profiles often carry ISO long forms; folding
/// them here keeps fusion and the denylist on one naming scheme.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("united states of america", "United States"),
    ("usa", "United States"),
    ("u.s.a.", "United States"),
    ("u.s.", "United States"),
    ("america", "United States"),
    ("uk", "United Kingdom"),
    ("u.k.", "United Kingdom"),
    ("great britain", "United Kingdom"),
    ("england", "United Kingdom"),
    ("scotland", "United Kingdom"),
    ("wales", "United Kingdom"),
    ("russian federation", "Russia"),
    ("people's republic of china", "China"),
    ("prc", "China"),
    ("mainland china", "China"),
    ("iran, islamic republic of", "Iran"),
    ("islamic republic of iran", "Iran"),
    ("korea, democratic people's republic of", "North Korea"),
    ("democratic people's republic of korea", "North Korea"),
    ("dprk", "North Korea"),
    ("korea, republic of", "South Korea"),
    ("republic of korea", "South Korea"),
    ("korea", "South Korea"),
    ("venezuela, bolivarian republic of", "Venezuela"),
    ("bolivarian republic of venezuela", "Venezuela"),
    ("syrian arab republic", "Syria"),
    ("viet nam", "Vietnam"),
    ("czechia", "Czech Republic"),
    ("deutschland", "Germany"),
    ("the netherlands", "Netherlands"),
    ("holland", "Netherlands"),
    ("taiwan, province of china", "Taiwan"),
    ("uae", "United Arab Emirates"),
];

/// A row of the world-cities table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityEntry {
    /// City name as spelled in the table.
    pub name: String,
    /// Country the city belongs to.
    pub country: String,
    /// State or region, if the table has one.
    pub state: Option<String>,
}

/// Country-code and city lookup tables.
///
/// Built once at start-up and shared behind an `Arc`; every method takes
/// `&self`, so concurrent readers need no locking.
#[derive(Debug, Default, Clone)]
pub struct Gazetteer {
    countries_by_code: HashMap<String, String>,
    countries_by_name: HashMap<String, String>,
    cities: HashMap<String, CityEntry>,
}

impl Gazetteer {
    /// Loads both reference tables from disk.
    pub fn load(country_codes: &Path, world_cities: &Path) -> Result<Self, ConfigError> {
        let countries = read_country_codes(open_table(country_codes)?);
        if countries.is_empty() {
            return Err(ConfigError::EmptyTable(country_codes.to_path_buf()));
        }

        let cities = read_world_cities(open_table(world_cities)?);
        if cities.is_empty() {
            return Err(ConfigError::EmptyTable(world_cities.to_path_buf()));
        }

        let gazetteer = Self::from_tables(countries, cities);
        tracing::debug!(
            countries = gazetteer.countries_by_code.len(),
            cities = gazetteer.cities.len(),
            "Loaded gazetteer"
        );
        Ok(gazetteer)
    }

    /// Builds a gazetteer from already-parsed rows.
    ///
    /// `countries` yields `(code, name)` pairs. Later duplicates overwrite
    /// earlier ones.
    pub fn from_tables<C, I>(countries: C, cities: I) -> Self
    where
        C: IntoIterator<Item = (String, String)>,
        I: IntoIterator<Item = CityEntry>,
    {
        let mut gazetteer = Self::default();
        for (code, name) in countries {
            gazetteer
                .countries_by_name
                .insert(name.to_lowercase(), name.clone());
            gazetteer
                .countries_by_code
                .insert(code.to_uppercase(), name);
        }
        for entry in cities {
            gazetteer.cities.insert(entry.name.to_lowercase(), entry);
        }
        gazetteer
    }

    /// Looks up a city by case-insensitive name.
    pub fn city(&self, name: &str) -> Option<&CityEntry> {
        self.cities.get(&name.trim().to_lowercase())
    }

    /// Looks up a country name by its code, e.g. `"DE"` → `"Germany"`.
    pub fn country_by_code(&self, code: &str) -> Option<&str> {
        self.countries_by_code
            .get(&code.trim().to_uppercase())
            .map(String::as_str)
    }

    /// Resolves a code, table name or known alias to the canonical country
    /// name. Returns `None` for unknown or unrecognised input.
    pub fn canonical_country(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if is_unknown(trimmed) {
            return None;
        }

        if let Some(name) = self.country_by_code(trimmed) {
            return Some(name.to_string());
        }

        let lowered = trimmed.to_lowercase();
        if let Some(name) = self.countries_by_name.get(&lowered) {
            return Some(name.clone());
        }

        COUNTRY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map(|(_, canonical)| {
                self.countries_by_name
                    .get(&canonical.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| (*canonical).to_string())
            })
    }

    /// Like [`canonical_country`](Self::canonical_country), but keeps
    /// unrecognised input as-is and maps empty input to `"Unknown"`.
    pub fn canonical_or_raw(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if is_unknown(trimmed) {
            return super::UNKNOWN.to_string();
        }
        self.canonical_country(trimmed)
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Country names, sorted.
    pub fn country_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.countries_by_code.values().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// City entries, sorted by name.
    pub fn cities(&self) -> Vec<&CityEntry> {
        let mut cities: Vec<&CityEntry> = self.cities.values().collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        cities
    }
}

fn open_table(path: &Path) -> Result<File, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    File::open(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the country-code table: a header row, then `name,code` rows.
///
/// Rows with the wrong column count are skipped.
pub fn read_country_codes<R: Read>(reader: R) -> Vec<(String, String)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 2, "Skipping unreadable country-code row: {e}");
                continue;
            }
        };
        if record.len() != 2 {
            tracing::debug!(line = line + 2, columns = record.len(), "Skipping country-code row");
            continue;
        }
        let name = record[0].trim();
        let code = record[1].trim();
        if name.is_empty() || code.is_empty() {
            continue;
        }
        rows.push((code.to_string(), name.to_string()));
    }
    rows
}

/// Parses the world-cities table: `city,country,state,population` rows
/// without a header.
///
/// Rows with the wrong column count are skipped.
pub fn read_world_cities<R: Read>(reader: R) -> Vec<CityEntry> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 1, "Skipping unreadable city row: {e}");
                continue;
            }
        };
        if record.len() != 4 {
            tracing::debug!(line = line + 1, columns = record.len(), "Skipping city row");
            continue;
        }
        let name = record[0].trim();
        let country = record[1].trim();
        if name.is_empty() || country.is_empty() {
            continue;
        }
        let state = Some(record[2].trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        entries.push(CityEntry {
            name: name.to_string(),
            country: country.to_string(),
            state,
        });
    }
    entries
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Small gazetteer shared by the geo tests.
    pub(crate) fn sample_gazetteer() -> Gazetteer {
        let countries = [
            ("US", "United States"),
            ("GB", "United Kingdom"),
            ("FR", "France"),
            ("DE", "Germany"),
            ("CN", "China"),
            ("RU", "Russia"),
            ("JP", "Japan"),
            ("LU", "Luxembourg"),
            ("IR", "Iran"),
        ]
        .into_iter()
        .map(|(c, n)| (c.to_string(), n.to_string()));

        let cities = [
            ("New York City", "United States", "New York"),
            ("Austin", "United States", "Texas"),
            ("San Francisco", "United States", "California"),
            ("London", "United Kingdom", "England"),
            ("Paris", "France", "Ile-de-France"),
            ("Berlin", "Germany", "Berlin"),
            ("Munich", "Germany", "Bavaria"),
            ("Beijing", "China", "Beijing"),
            ("Moscow", "Russia", "Moscow"),
            ("Tokyo", "Japan", "Tokyo"),
        ]
        .into_iter()
        .map(|(name, country, state)| CityEntry {
            name: name.to_string(),
            country: country.to_string(),
            state: Some(state.to_string()),
        });

        Gazetteer::from_tables(countries, cities)
    }

    #[test]
    fn country_codes_skip_malformed_rows() {
        let table = "Country Name,Code\nFrance,FR\nbroken row\nGermany,DE,extra\n\"Korea, Republic of\",KR\n";
        let rows = read_country_codes(table.as_bytes());
        assert_eq!(
            rows,
            vec![
                ("FR".to_string(), "France".to_string()),
                ("KR".to_string(), "Korea, Republic of".to_string()),
            ]
        );
    }

    #[test]
    fn world_cities_skip_malformed_rows() {
        let table = "Paris,France,Ile-de-France,2102650\nNowhere,Atlantis\nBerlin,Germany,,3677472\n";
        let rows = read_world_cities(table.as_bytes());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Paris");
        assert_eq!(rows[1].state, None);
    }

    #[test]
    fn load_fails_on_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let cities = temp_dir.path().join("world_cities.csv");
        fs::write(&cities, "Paris,France,Ile-de-France,1\n").unwrap();

        let err = Gazetteer::load(&temp_dir.path().join("missing.csv"), &cities).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn load_fails_on_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let countries = temp_dir.path().join("country_codes.csv");
        let cities = temp_dir.path().join("world_cities.csv");
        fs::write(&countries, "Country Name,Code\nFrance,FR\n").unwrap();
        fs::write(&cities, "only,three,columns\n").unwrap();

        let err = Gazetteer::load(&countries, &cities).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTable(_)));
    }

    #[test]
    fn city_lookup_is_case_insensitive() {
        let gazetteer = sample_gazetteer();
        let entry = gazetteer.city("  paris ").unwrap();
        assert_eq!(entry.name, "Paris");
        assert_eq!(entry.country, "France");
    }

    #[test]
    fn canonical_country_resolves_codes_names_and_aliases() {
        let gazetteer = sample_gazetteer();
        assert_eq!(gazetteer.canonical_country("us").as_deref(), Some("United States"));
        assert_eq!(gazetteer.canonical_country("GERMANY").as_deref(), Some("Germany"));
        assert_eq!(
            gazetteer.canonical_country("Russian Federation").as_deref(),
            Some("Russia")
        );
        assert_eq!(
            gazetteer.canonical_country("Korea, Democratic People's Republic of").as_deref(),
            Some("North Korea")
        );
        assert_eq!(gazetteer.canonical_country("Atlantis"), None);
        assert_eq!(gazetteer.canonical_country("Unknown"), None);
        assert_eq!(gazetteer.canonical_country(""), None);
    }

    #[test]
    fn canonical_or_raw_keeps_unrecognised_input() {
        let gazetteer = sample_gazetteer();
        assert_eq!(gazetteer.canonical_or_raw("CN"), "China");
        assert_eq!(gazetteer.canonical_or_raw(" Europe "), "Europe");
        assert_eq!(gazetteer.canonical_or_raw("  "), "Unknown");
    }

    #[test]
    fn country_names_sorted() {
        let gazetteer = sample_gazetteer();
        let names = gazetteer.country_names();
        assert_eq!(names.first(), Some(&"China"));
        assert_eq!(names.last(), Some(&"United States"));
    }
}
