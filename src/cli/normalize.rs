//! Normalize command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use super::DataArgs;
use crate::geo::{Gazetteer, PlaceNormalizer};

/// Normalize command options.
#[derive(Parser)]
pub struct NormalizeCommand {
    /// Free-text location (e.g., "Greater London" or "Austin, TX, USA").
    #[arg(value_name = "PLACE")]
    pub place: String,

    /// Reference data locations.
    #[command(flatten)]
    pub data: DataArgs,
}

impl NormalizeCommand {
    /// Executes the normalize command.
    pub fn execute(self) -> Result<()> {
        let gazetteer = Gazetteer::load(&self.data.country_codes, &self.data.world_cities)
            .context("Failed to load gazetteer")?;
        let normalizer = PlaceNormalizer::new(Arc::new(gazetteer));
        let place = normalizer.normalize(&self.place);
        print!(
            "{}",
            serde_yaml::to_string(&place).context("Failed to serialize result")?
        );
        Ok(())
    }
}
