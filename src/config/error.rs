//! Start-up configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading reference data and weights.
///
/// Any of these stops the program before contributor analysis begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A reference file does not exist.
    #[error("Reference file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A reference file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file could not be parsed.
    #[error("Failed to parse {}: {message}", path.display())]
    Malformed {
        /// Path of the malformed file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A reference table had no usable rows after skipping malformed ones.
    #[error("Reference table {} contains no usable rows", .0.display())]
    EmptyTable(PathBuf),

    /// A confidence weight lies outside `[0, 1]`.
    #[error("Weight `{field}` must be within [0, 1], got {value}")]
    WeightOutOfRange {
        /// JSON field name of the weight.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
}
