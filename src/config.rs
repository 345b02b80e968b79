//! Start-up configuration: reference tables, weights and credentials.

pub mod error;
pub mod settings;
pub mod weights;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::ConfigError;
pub use settings::{get_env_var, Settings};
pub use weights::ConfidenceWeights;

use crate::geo::Gazetteer;

/// Default location of the country-code table.
pub const DEFAULT_COUNTRY_CODES_PATH: &str = "data/country_codes.csv";

/// Default location of the world-cities table.
pub const DEFAULT_WORLD_CITIES_PATH: &str = "data/world_cities.csv";

/// Default location of the weights file.
pub const DEFAULT_WEIGHTS_PATH: &str = "data/weights.json";

/// Locations of the files loaded at start-up.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Country-code table (`name,code` with a header row).
    pub country_codes: PathBuf,
    /// World-cities table (`city,country,state,population`).
    pub world_cities: PathBuf,
    /// Confidence weights JSON.
    pub weights: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            country_codes: PathBuf::from(DEFAULT_COUNTRY_CODES_PATH),
            world_cities: PathBuf::from(DEFAULT_WORLD_CITIES_PATH),
            weights: PathBuf::from(DEFAULT_WEIGHTS_PATH),
        }
    }
}

/// Read-only data shared by every worker for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    /// Loaded gazetteer.
    pub gazetteer: Arc<Gazetteer>,
    /// Loaded confidence weights.
    pub weights: ConfidenceWeights,
}

impl ReferenceData {
    /// Loads the gazetteer and the weights. Any failure is fatal.
    pub fn load(paths: &DataPaths) -> Result<Self, ConfigError> {
        let gazetteer = Gazetteer::load(&paths.country_codes, &paths.world_cities)?;
        let weights = ConfidenceWeights::load_from_path(&paths.weights)?;
        Ok(Self {
            gazetteer: Arc::new(gazetteer),
            weights,
        })
    }
}
