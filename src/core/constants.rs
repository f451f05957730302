//! Calibration defaults and numerical guards

/// Reference distance d0 of the path-loss model (m)
pub const DEFAULT_REFERENCE_DISTANCE_M: f64 = 1.0;
/// RSSI observed at the reference distance (dBm)
pub const DEFAULT_REFERENCE_RSSI_DBM: f64 = -40.0;
/// Path-loss exponent n for indoor propagation
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.75;
/// Standard deviation of a single RSSI reading (dB)
pub const DEFAULT_RSSI_SIGMA_DB: f64 = 3.0;

/// Distances are clamped to at least this before variance propagation
pub const MIN_VARIANCE_DISTANCE_M: f64 = 1e-6;

/// Minimum number of usable stations for a 2D fix
pub const MIN_STATIONS_FOR_FIX: usize = 3;
/// Number of nearest stations kept by the default selection policy
pub const NEAREST_STATIONS_KEPT: usize = 3;
/// Hard iteration budget of the robust solver
pub const MAX_SOLVER_ITERATIONS: usize = 10;
/// A correction shorter than this ends the iteration (m)
pub const CONVERGENCE_STEP_M: f64 = 1e-3;
/// Predicted ranges are clamped to at least this (m)
pub const MIN_PREDICTED_RANGE_M: f64 = 1e-6;
/// Normal equations with |det| below this are treated as singular
pub const SINGULAR_DETERMINANT_THRESHOLD: f64 = 1e-9;
/// Huber threshold as a multiple of the RMS residual
pub const HUBER_SCALE: f64 = 1.5;
/// Huber threshold used when the RMS residual is near zero
pub const HUBER_FALLBACK_THRESHOLD: f64 = 1.0;
/// RMS residuals below this count as zero when picking the Huber threshold
pub const RESIDUAL_SCALE_EPSILON: f64 = 1e-9;

/// Time step of the constant-velocity prediction (s)
pub const DEFAULT_FILTER_DT_S: f64 = 0.1;
/// Fixed blend gain of the fusion filter update
pub const DEFAULT_FILTER_GAIN: f64 = 0.5;

/// Field delimiter of the station table file
pub const STATION_FILE_DELIMITER: u8 = b';';
/// Publish/subscribe topic carrying measurement batches
pub const MEASUREMENT_TOPIC: &str = "sensors/data";
