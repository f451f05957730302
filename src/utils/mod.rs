//! Configuration and station registry loading

pub mod config;
pub mod stations;

pub use config::LocatorConfig;
pub use stations::{SharedStations, StationFile, StationTable};
