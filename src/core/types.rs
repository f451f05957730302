//! Core data types for the localization engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D position in the shared station coordinate frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// One RSSI reading of a station, as received in a measurement batch.
///
/// On the wire the station identifier is carried in the `name` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMeasurement {
    #[serde(rename = "name")]
    pub station_id: String,
    pub rssi: f64,
}

impl StationMeasurement {
    pub fn new(station_id: impl Into<String>, rssi: f64) -> Self {
        Self {
            station_id: station_id.into(),
            rssi,
        }
    }
}

/// A measurement after path-loss conversion, bound to its station position
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEstimate {
    pub station_id: String,
    pub station_position: Position,
    /// Estimated distance to the station, never negative
    pub distance: f64,
    /// Propagated variance of `distance`, strictly positive
    pub variance: f64,
}
