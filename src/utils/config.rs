use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::algorithms::path_loss::PathLossModel;
use crate::algorithms::robust_wls::SolverConfig;
use crate::processing::kalman::FilterConfig;
use crate::utils::stations::StationFile;
use crate::validation::ConfigError;

/// Engine configuration. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// RSSI to range calibration
    pub path_loss: PathLossModel,
    /// Robust solver tunables
    pub solver: SolverConfig,
    /// Fusion filter tunables
    pub filter: FilterConfig,
    /// Location of the `Name;X;Y` station table
    pub stations_path: Option<PathBuf>,
}

impl LocatorConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: LocatorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.path_loss.validate()?;
        self.solver.validate()?;
        self.filter.validate()
    }

    pub fn station_file(&self) -> Option<StationFile> {
        self.stations_path.as_ref().map(StationFile::new)
    }
}
