//! RSSI Localization Engine
//!
//! Estimates the 2D position of a tag from RSSI readings of fixed stations:
//! log-distance path-loss ranging, Huber-robust weighted least squares and a
//! recursive fusion filter that keeps the estimate across batches.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use self::core::{Position, RangeEstimate, StationMeasurement, MEASUREMENT_TOPIC};
pub use algorithms::{PathLossModel, RobustWlsSolver, SelectionPolicy, SolveOutcome, SolveResult, SolverConfig, UnsolvableReason};
pub use processing::{decode_batch, DecodedBatch, FilterConfig, FilterState, MotionFilter, PositionKalmanFilter};
pub use validation::{BatchError, ConfigError};
pub use utils::{LocatorConfig, SharedStations, StationFile, StationTable};
pub use api::{locate, Fix, LocateOutcome, Localizer, RouteState, TrackingSession};
