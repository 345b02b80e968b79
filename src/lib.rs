//! # geo-provenance
//!
//! Infers the likely geographic origin of a repository's contributors by
//! fusing weak signals: the declared profile location, the registration
//! country of the email domain, and the declared organization.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use geo_provenance::geo::{CityEntry, Gazetteer, PlaceNormalizer};
//!
//! let gazetteer = Gazetteer::from_tables(
//!     [("FR".to_string(), "France".to_string())],
//!     [CityEntry {
//!         name: "Paris".to_string(),
//!         country: "France".to_string(),
//!         state: None,
//!     }],
//! );
//! let normalizer = PlaceNormalizer::new(Arc::new(gazetteer));
//! assert_eq!(normalizer.normalize("paris").country, "France");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod activity;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod contributor;
pub mod domain;
pub mod geo;
pub mod geocode;
pub mod github;
pub mod report;
pub mod retrieval;

pub use crate::cli::Cli;
pub use crate::contributor::Contributor;

/// The current version of geo-provenance.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
