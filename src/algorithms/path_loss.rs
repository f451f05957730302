//! Log-distance path-loss model
//!
//! Converts an RSSI reading into a range and the variance of that range:
//!
//! ```text
//! d       = d0 * 10^((rssi0 - rssi) / (10 n))
//! var(d)  = (d * ln(10) / (10 n))^2 * sigma_rssi^2
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;
use std::fmt;

use crate::core::{
    Position, RangeEstimate, DEFAULT_PATH_LOSS_EXPONENT, DEFAULT_REFERENCE_DISTANCE_M,
    DEFAULT_REFERENCE_RSSI_DBM, DEFAULT_RSSI_SIGMA_DB, MIN_VARIANCE_DISTANCE_M,
};
use crate::validation::ConfigError;

/// Calibration of the log-distance path-loss model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathLossModel {
    /// Reference distance d0 (m)
    pub reference_distance_m: f64,
    /// RSSI measured at d0 (dBm)
    pub reference_rssi_dbm: f64,
    /// Path-loss exponent n
    pub path_loss_exponent: f64,
    /// Standard deviation of a single RSSI reading (dB)
    pub rssi_sigma_db: f64,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            reference_distance_m: DEFAULT_REFERENCE_DISTANCE_M,
            reference_rssi_dbm: DEFAULT_REFERENCE_RSSI_DBM,
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
            rssi_sigma_db: DEFAULT_RSSI_SIGMA_DB,
        }
    }
}

impl PathLossModel {
    pub fn new(
        reference_distance_m: f64,
        reference_rssi_dbm: f64,
        path_loss_exponent: f64,
        rssi_sigma_db: f64,
    ) -> Self {
        Self {
            reference_distance_m,
            reference_rssi_dbm,
            path_loss_exponent,
            rssi_sigma_db,
        }
    }

    /// Distance implied by an RSSI reading.
    ///
    /// Stronger readings give shorter distances. The result is saturated into
    /// `[f64::MIN_POSITIVE, f64::MAX]` so that any finite RSSI maps to a
    /// finite positive distance; very weak readings yield very large ranges.
    pub fn rssi_to_distance(&self, rssi: f64) -> f64 {
        let exponent = (self.reference_rssi_dbm - rssi) / (10.0 * self.path_loss_exponent);
        let distance = self.reference_distance_m * 10_f64.powf(exponent);
        distance.clamp(f64::MIN_POSITIVE, f64::MAX)
    }

    /// RSSI expected at a given distance (inverse of `rssi_to_distance`)
    pub fn distance_to_rssi(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return f64::INFINITY;
        }
        self.reference_rssi_dbm
            - 10.0 * self.path_loss_exponent * (distance / self.reference_distance_m).log10()
    }

    /// Variance of a distance estimate propagated from the RSSI noise.
    ///
    /// The distance is clamped to `MIN_VARIANCE_DISTANCE_M` first so the
    /// result stays strictly positive.
    pub fn variance_from_rssi(&self, distance: f64) -> f64 {
        let distance = distance.max(MIN_VARIANCE_DISTANCE_M);
        let factor = distance * LN_10 / (10.0 * self.path_loss_exponent);
        (factor * factor * self.rssi_sigma_db * self.rssi_sigma_db).min(f64::MAX)
    }

    /// Convert one reading of a known station into a range estimate
    pub fn range_estimate(&self, station_id: &str, station_position: Position, rssi: f64) -> RangeEstimate {
        let distance = self.rssi_to_distance(rssi);
        RangeEstimate {
            station_id: station_id.to_string(),
            station_position,
            distance,
            variance: self.variance_from_rssi(distance),
        }
    }

    /// Check that the calibration describes a usable model
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reference_distance_m.is_finite() && self.reference_distance_m > 0.0) {
            return Err(ConfigError::invalid(
                "reference_distance_m",
                self.reference_distance_m,
                "must be positive and finite",
            ));
        }
        if !self.reference_rssi_dbm.is_finite() {
            return Err(ConfigError::invalid(
                "reference_rssi_dbm",
                self.reference_rssi_dbm,
                "must be finite",
            ));
        }
        if !(self.path_loss_exponent.is_finite() && self.path_loss_exponent > 0.0) {
            return Err(ConfigError::invalid(
                "path_loss_exponent",
                self.path_loss_exponent,
                "must be positive so that stronger signals mean shorter ranges",
            ));
        }
        if !(self.rssi_sigma_db.is_finite() && self.rssi_sigma_db > 0.0) {
            return Err(ConfigError::invalid(
                "rssi_sigma_db",
                self.rssi_sigma_db,
                "must be positive and finite",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PathLossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "log-distance model: d0={:.2} m, rssi0={:.1} dBm, n={:.2}, sigma={:.1} dB",
            self.reference_distance_m,
            self.reference_rssi_dbm,
            self.path_loss_exponent,
            self.rssi_sigma_db
        )
    }
}
