//! Station registry: known station coordinates loaded from a `Name;X;Y` table

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::core::{Position, STATION_FILE_DELIMITER};
use crate::validation::ConfigError;

/// One row of the station file
#[derive(Debug, Deserialize)]
struct StationRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
}

/// Mapping from station identifier to its known position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationTable {
    stations: HashMap<String, Position>,
}

impl StationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `;`-delimited table with a `Name;X;Y` header.
    ///
    /// `source_name` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self, ConfigError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(STATION_FILE_DELIMITER)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = StationTable::new();
        for record in csv_reader.deserialize::<StationRecord>() {
            let record = record?;
            table.insert(record.name, Position::new(record.x, record.y))?;
        }

        if table.is_empty() {
            return Err(ConfigError::EmptyStationTable {
                source_name: source_name.to_string(),
            });
        }
        Ok(table)
    }

    /// Add a station; names must be unique and coordinates finite
    pub fn insert(&mut self, name: String, position: Position) -> Result<(), ConfigError> {
        for value in [position.x, position.y] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidCoordinate { name, value });
            }
        }
        if self.stations.contains_key(&name) {
            return Err(ConfigError::DuplicateStation { name });
        }
        self.stations.insert(name, position);
        Ok(())
    }

    /// Build a table from in-memory entries, with the same checks as `insert`
    pub fn from_entries<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, Position)>,
    {
        let mut table = StationTable::new();
        for (name, position) in entries {
            table.insert(name, position)?;
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&Position> {
        self.stations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Position)> {
        self.stations.iter()
    }
}


/// A station table stored on disk
#[derive(Debug, Clone)]
pub struct StationFile {
    path: PathBuf,
}

impl StationFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the whole table. Repeated loads of an unchanged file are identical.
    pub fn load(&self) -> Result<StationTable, ConfigError> {
        if !self.exists() {
            return Err(ConfigError::MissingStationFile {
                path: self.path.clone(),
            });
        }
        let file = File::open(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let table = StationTable::from_reader(file, &self.path.to_string_lossy())?;
        info!(path = %self.path.display(), stations = table.len(), "loaded station table");
        Ok(table)
    }
}

/// Station table shared between sessions.
///
/// Readers take an `Arc` snapshot for the duration of a solve; reloads swap
/// in a complete new table so a solve never sees a partial update.
#[derive(Debug)]
pub struct SharedStations {
    current: RwLock<Arc<StationTable>>,
}

impl SharedStations {
    /// An empty table is rejected; the pipeline could never produce a fix
    pub fn new(table: StationTable) -> Result<Self, ConfigError> {
        ensure_not_empty(&table)?;
        Ok(Self {
            current: RwLock::new(Arc::new(table)),
        })
    }

    /// Load the initial table from a file
    pub fn load(file: &StationFile) -> Result<Self, ConfigError> {
        Self::new(file.load()?)
    }

    pub fn snapshot(&self) -> Arc<StationTable> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new table. An empty table is rejected and the current one kept.
    pub fn replace(&self, table: StationTable) -> Result<(), ConfigError> {
        ensure_not_empty(&table)?;
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(table);
        Ok(())
    }

    /// Re-read the file and swap it in. On error the previous table stays active.
    pub fn reload(&self, file: &StationFile) -> Result<usize, ConfigError> {
        let table = file.load()?;
        let count = table.len();
        self.replace(table)?;
        Ok(count)
    }
}

fn ensure_not_empty(table: &StationTable) -> Result<(), ConfigError> {
    if table.is_empty() {
        return Err(ConfigError::EmptyStationTable {
            source_name: "shared station table".to_string(),
        });
    }
    Ok(())
}
