//! Synchronous localization pipeline
//!
//! One call per received batch: predict, solve, blend the fix in when there
//! is one, and return the filtered position. A batch that cannot be solved
//! leaves the prediction untouched, so the caller always gets a position.

use tracing::{debug, warn};

use crate::algorithms::robust_wls::{RobustWlsSolver, SolveOutcome, UnsolvableReason};
use crate::api::types::{Fix, LocateOutcome};
use crate::core::{Position, StationMeasurement};
use crate::processing::kalman::{FilterState, MotionFilter};
use crate::utils::config::LocatorConfig;
use crate::utils::stations::StationTable;

/// Run one pipeline step against an explicit filter state
pub fn locate_with<F: MotionFilter>(
    solver: &RobustWlsSolver,
    measurements: &[StationMeasurement],
    stations: &StationTable,
    filter: &mut F,
) -> LocateOutcome {
    filter.predict();

    let fix = match solver.solve(measurements, stations) {
        SolveOutcome::Solved(result) => {
            filter.update(result.position, result.approx_covariance.as_ref());
            Fix::Corrected(result)
        }
        SolveOutcome::Unsolvable(reason) => {
            match &reason {
                UnsolvableReason::InsufficientStations { usable, required } => {
                    debug!(usable, required, "batch unsolvable, holding prediction");
                }
                UnsolvableReason::DegenerateGeometry { determinant } => {
                    warn!(determinant, "degenerate station geometry, holding prediction");
                }
            }
            Fix::DeadReckoned(reason)
        }
    };

    LocateOutcome {
        position: filter.get_state(),
        fix,
    }
}

/// Run one pipeline step with the default solver
pub fn locate<F: MotionFilter>(
    measurements: &[StationMeasurement],
    stations: &StationTable,
    filter_state: &mut F,
) -> Position {
    locate_with(&RobustWlsSolver::default(), measurements, stations, filter_state).position
}

/// Solver plus the filter state of one tracking session
#[derive(Debug, Clone)]
pub struct Localizer<F: MotionFilter = FilterState> {
    solver: RobustWlsSolver,
    filter: F,
}

impl Default for Localizer<FilterState> {
    fn default() -> Self {
        Self::new(&LocatorConfig::default())
    }
}

impl Localizer<FilterState> {
    pub fn new(config: &LocatorConfig) -> Self {
        Self {
            solver: RobustWlsSolver::new(config.path_loss, config.solver),
            filter: FilterState::new(config.filter),
        }
    }
}

impl<F: MotionFilter> Localizer<F> {
    pub fn with_filter(solver: RobustWlsSolver, filter: F) -> Self {
        Self { solver, filter }
    }

    /// Filtered position after this batch
    pub fn locate(&mut self, measurements: &[StationMeasurement], stations: &StationTable) -> Position {
        self.locate_detailed(measurements, stations).position
    }

    /// Filtered position plus how it was obtained
    pub fn locate_detailed(
        &mut self,
        measurements: &[StationMeasurement],
        stations: &StationTable,
    ) -> LocateOutcome {
        locate_with(&self.solver, measurements, stations, &mut self.filter)
    }

    pub fn position(&self) -> Position {
        self.filter.get_state()
    }

    pub fn solver(&self) -> &RobustWlsSolver {
        &self.solver
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut F {
        &mut self.filter
    }

    /// Reinitialize the filter, e.g. when a new route starts
    pub fn reset(&mut self) {
        self.filter.reset();
    }
}
