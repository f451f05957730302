//! Error taxonomy of the localization engine
//!
//! Only configuration problems and unreadable batches are errors. Dropped
//! measurements and batches with too little geometry are expected outcomes and
//! are reported through `SolveOutcome` instead.

use std::path::PathBuf;
use thiserror::Error;

/// Station table or engine configuration could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Source file could not be read or written
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Station file does not exist
    #[error("Station file '{}' not found", path.display())]
    MissingStationFile { path: PathBuf },

    /// Malformed delimited station table
    #[error("Malformed station table: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON configuration
    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Source parsed but contained no station
    #[error("Station table '{source_name}' contains no stations")]
    EmptyStationTable { source_name: String },

    /// Station name listed more than once
    #[error("Station '{name}' is defined more than once")]
    DuplicateStation { name: String },

    /// Coordinate is NaN or infinite
    #[error("Station '{name}' has a non-finite coordinate: {value}")]
    InvalidCoordinate { name: String, value: f64 },

    /// Tunable parameter out of range
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A measurement batch payload that cannot be decoded at all
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Batch payload must be a JSON array, got {found}")]
    NotAnArray { found: &'static str },
}
