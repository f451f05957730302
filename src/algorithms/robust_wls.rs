//! Huber-robust iteratively reweighted least squares for 2D range positioning
//!
//! Each iteration linearizes the range equations around the current estimate,
//! down-weights residuals larger than `huber_scale` times the RMS residual and
//! solves the 2x2 weighted normal equations for a position correction.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::path_loss::PathLossModel;
use crate::core::{
    Position, RangeEstimate, StationMeasurement, CONVERGENCE_STEP_M, HUBER_FALLBACK_THRESHOLD,
    HUBER_SCALE, MAX_SOLVER_ITERATIONS, MIN_PREDICTED_RANGE_M, MIN_STATIONS_FOR_FIX,
    NEAREST_STATIONS_KEPT, RESIDUAL_SCALE_EPSILON, SINGULAR_DETERMINANT_THRESHOLD,
};
use crate::utils::stations::StationTable;
use crate::validation::ConfigError;

/// Which range estimates take part in a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// The three nearest stations plus the single farthest one (at most four)
    #[default]
    NearestPlusFarthest,
    /// Every usable station
    AllStations,
}

impl SelectionPolicy {
    /// Pick the estimates to solve with. Ties keep measurement order.
    pub fn select(&self, mut ranges: Vec<RangeEstimate>) -> Vec<RangeEstimate> {
        ranges.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        match self {
            SelectionPolicy::AllStations => ranges,
            SelectionPolicy::NearestPlusFarthest => {
                if ranges.len() <= NEAREST_STATIONS_KEPT {
                    return ranges;
                }
                let farthest = ranges.pop();
                ranges.truncate(NEAREST_STATIONS_KEPT);
                ranges.extend(farthest);
                ranges
            }
        }
    }
}

/// Tunables of the robust solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Hard cap on reweighting iterations
    pub max_iterations: usize,
    /// Correction magnitude that counts as converged (m)
    pub convergence_tolerance: f64,
    /// Lower clamp of predicted ranges (m)
    pub min_predicted_range: f64,
    /// Determinant magnitude below which the normal equations are singular
    pub singular_threshold: f64,
    /// Huber threshold in units of the RMS residual
    pub huber_scale: f64,
    pub selection: SelectionPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SOLVER_ITERATIONS,
            convergence_tolerance: CONVERGENCE_STEP_M,
            min_predicted_range: MIN_PREDICTED_RANGE_M,
            singular_threshold: SINGULAR_DETERMINANT_THRESHOLD,
            huber_scale: HUBER_SCALE,
            selection: SelectionPolicy::NearestPlusFarthest,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", self.max_iterations, "must be at least 1"));
        }
        let positive = [
            ("convergence_tolerance", self.convergence_tolerance),
            ("min_predicted_range", self.min_predicted_range),
            ("singular_threshold", self.singular_threshold),
            ("huber_scale", self.huber_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(name, value, "must be positive and finite"));
            }
        }
        Ok(())
    }
}

/// Output of a successful solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub position: Position,
    /// Weighted normal matrix of the last iteration (information proxy)
    pub information: Matrix2<f64>,
    /// Inverse of `information`, absent when it is singular
    pub approx_covariance: Option<Matrix2<f64>>,
    /// Normal-equation solves performed
    pub iterations: usize,
    /// Whether the last correction fell below the convergence tolerance
    pub converged: bool,
    /// RMS range residual at the returned position (m)
    pub residual_rms: f64,
    pub stations_used: Vec<String>,
}

/// Why a batch produced no fix
#[derive(Debug, Clone, PartialEq)]
pub enum UnsolvableReason {
    /// Too few measurements of known stations
    InsufficientStations { usable: usize, required: usize },
    /// Normal equations singular before any correction could be applied
    DegenerateGeometry { determinant: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Solved(SolveResult),
    Unsolvable(UnsolvableReason),
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved(_))
    }

    pub fn solved(self) -> Option<SolveResult> {
        match self {
            SolveOutcome::Solved(result) => Some(result),
            SolveOutcome::Unsolvable(_) => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            SolveOutcome::Solved(result) => Some(result.position),
            SolveOutcome::Unsolvable(_) => None,
        }
    }
}

/// Huber down-weighting: `base` inside the threshold, `base * c / |r|` outside
pub fn huber_weight(residual: f64, threshold: f64, base: f64) -> f64 {
    let magnitude = residual.abs();
    if magnitude > threshold {
        base * threshold / magnitude
    } else {
        base
    }
}

/// Robust weighted least-squares position solver
#[derive(Debug, Clone, Default)]
pub struct RobustWlsSolver {
    pub model: PathLossModel,
    pub config: SolverConfig,
}

impl RobustWlsSolver {
    pub fn new(model: PathLossModel, config: SolverConfig) -> Self {
        Self { model, config }
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.config.selection = selection;
        self
    }

    /// Convert the measurements of known stations into range estimates.
    /// Unknown stations and non-finite readings are dropped.
    pub fn range_estimates(
        &self,
        measurements: &[StationMeasurement],
        stations: &StationTable,
    ) -> Vec<RangeEstimate> {
        measurements
            .iter()
            .filter_map(|m| {
                if !m.rssi.is_finite() {
                    debug!(station = %m.station_id, rssi = m.rssi, "dropping non-finite reading");
                    return None;
                }
                match stations.get(&m.station_id) {
                    Some(position) => Some(self.model.range_estimate(&m.station_id, *position, m.rssi)),
                    None => {
                        debug!(station = %m.station_id, "dropping reading of unknown station");
                        None
                    }
                }
            })
            .collect()
    }

    /// Estimate the tag position from one measurement batch
    pub fn solve(&self, measurements: &[StationMeasurement], stations: &StationTable) -> SolveOutcome {
        let ranges = self.range_estimates(measurements, stations);
        self.solve_ranges(ranges)
    }

    /// Estimate the tag position from already converted range estimates.
    ///
    /// Singular normal equations on the first iteration make the batch
    /// `DegenerateGeometry`. On a later iteration the solver stops and returns
    /// the last estimate, unconverged and without a covariance.
    pub fn solve_ranges(&self, ranges: Vec<RangeEstimate>) -> SolveOutcome {
        if ranges.len() < MIN_STATIONS_FOR_FIX {
            return SolveOutcome::Unsolvable(UnsolvableReason::InsufficientStations {
                usable: ranges.len(),
                required: MIN_STATIONS_FOR_FIX,
            });
        }

        let selected = self.config.selection.select(ranges);
        let mut estimate = centroid(&selected);
        let mut information: Matrix2<f64> = Matrix2::zeros();
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 0..self.config.max_iterations {
            let rows = self.linearize(&selected, &estimate);

            let sigma = (rows.iter().map(|(r, _)| r * r).sum::<f64>() / rows.len() as f64).sqrt();
            let threshold = if sigma > RESIDUAL_SCALE_EPSILON {
                self.config.huber_scale * sigma
            } else {
                HUBER_FALLBACK_THRESHOLD
            };

            let mut normal: Matrix2<f64> = Matrix2::zeros();
            let mut rhs: Vector2<f64> = Vector2::zeros();
            for (&(residual, jacobian), range) in rows.iter().zip(&selected) {
                let weight = huber_weight(residual, threshold, 1.0 / range.variance);
                normal += jacobian * jacobian.transpose() * weight;
                rhs += jacobian * (weight * residual);
            }
            information = normal;

            let determinant = normal.determinant();
            if determinant.abs() < self.config.singular_threshold {
                debug!(iteration, determinant, "normal equations singular");
                if iteration == 0 {
                    return SolveOutcome::Unsolvable(UnsolvableReason::DegenerateGeometry { determinant });
                }
                break;
            }

            // 2x2 inverse; determinant already checked
            let inverse = Matrix2::new(normal[(1, 1)], -normal[(0, 1)], -normal[(1, 0)], normal[(0, 0)])
                / determinant;
            let correction = inverse * rhs;
            estimate.x += correction.x;
            estimate.y += correction.y;
            iterations = iteration + 1;

            let step = correction.norm();
            debug!(iteration, step, sigma, x = estimate.x, y = estimate.y, "wls iteration");
            if step < self.config.convergence_tolerance {
                converged = true;
                break;
            }
        }

        let residual_rms = {
            let rows = self.linearize(&selected, &estimate);
            (rows.iter().map(|(r, _)| r * r).sum::<f64>() / rows.len() as f64).sqrt()
        };
        let approx_covariance = if information.determinant().abs() < self.config.singular_threshold {
            None
        } else {
            information.try_inverse()
        };

        SolveOutcome::Solved(SolveResult {
            position: estimate,
            information,
            approx_covariance,
            iterations,
            converged,
            residual_rms,
            stations_used: selected.into_iter().map(|r| r.station_id).collect(),
        })
    }

    /// Residual (observed - predicted) and range gradient for each estimate
    fn linearize(&self, ranges: &[RangeEstimate], estimate: &Position) -> Vec<(f64, Vector2<f64>)> {
        ranges
            .iter()
            .map(|range| {
                let dx = estimate.x - range.station_position.x;
                let dy = estimate.y - range.station_position.y;
                let predicted = predicted_range(dx, dy, self.config.min_predicted_range);
                (range.distance - predicted, Vector2::new(dx / predicted, dy / predicted))
            })
            .collect()
    }
}

/// Euclidean range clamped from below so it can be divided by
pub fn predicted_range(dx: f64, dy: f64, min_range: f64) -> f64 {
    dx.hypot(dy).max(min_range)
}

fn centroid(ranges: &[RangeEstimate]) -> Position {
    let n = ranges.len() as f64;
    Position::new(
        ranges.iter().map(|r| r.station_position.x).sum::<f64>() / n,
        ranges.iter().map(|r| r.station_position.y).sum::<f64>() / n,
    )
}

/// Solve one batch with the default model and solver settings
pub fn solve(measurements: &[StationMeasurement], stations: &StationTable) -> SolveOutcome {
    RobustWlsSolver::default().solve(measurements, stations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations(entries: &[(&str, f64, f64)]) -> StationTable {
        StationTable::from_entries(
            entries
                .iter()
                .map(|(name, x, y)| (name.to_string(), Position::new(*x, *y))),
        )
        .unwrap()
    }

    /// Noiseless readings of every station as seen from `truth`
    fn exact_readings(table: &StationTable, names: &[&str], truth: Position) -> Vec<StationMeasurement> {
        let model = PathLossModel::default();
        names
            .iter()
            .map(|name| {
                let station = table.get(name).unwrap();
                StationMeasurement::new(*name, model.distance_to_rssi(station.distance_to(&truth)))
            })
            .collect()
    }

    fn reading_at(name: &str, distance: f64) -> StationMeasurement {
        StationMeasurement::new(name, PathLossModel::default().distance_to_rssi(distance))
    }

    fn range(name: &str, distance: f64) -> RangeEstimate {
        RangeEstimate {
            station_id: name.to_string(),
            station_position: Position::ORIGIN,
            distance,
            variance: 1.0,
        }
    }

    #[test]
    fn test_fewer_than_three_known_stations_is_unsolvable() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);

        let outcome = solve(&[reading_at("A", 3.0), reading_at("B", 4.0)], &table);
        assert_eq!(
            outcome,
            SolveOutcome::Unsolvable(UnsolvableReason::InsufficientStations { usable: 2, required: 3 })
        );

        // Unknown station does not count
        let outcome = solve(
            &[reading_at("A", 3.0), reading_at("B", 4.0), reading_at("X", 5.0)],
            &table,
        );
        assert!(!outcome.is_solved());

        assert!(!solve(&[], &table).is_solved());
    }

    #[test]
    fn test_exact_ranges_converge_to_truth() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let truth = Position::new(3.0, 4.0);
        let readings = exact_readings(&table, &["A", "B", "C"], truth);

        let result = solve(&readings, &table).solved().unwrap();
        assert!(result.position.distance_to(&truth) < 1e-3);
        assert!(result.converged);
        assert!(result.iterations <= MAX_SOLVER_ITERATIONS);
        assert!(result.residual_rms < 1e-3);
        assert!(result.approx_covariance.is_some());
        assert_eq!(result.stations_used.len(), 3);
    }

    #[test]
    fn test_end_to_end_triangle_scenario() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let truth = Position::new(2.5, 2.5);
        let readings = exact_readings(&table, &["A", "B", "C"], truth);

        let result = solve(&readings, &table).solved().unwrap();
        assert!(result.position.distance_to(&truth) < 0.5);
    }

    #[test]
    fn test_inconsistent_ranges_give_best_fit() {
        // Ranges 5, 5, 7.07 cannot all hold at once; the solver settles on a
        // compromise between the three circles instead of failing.
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let readings = vec![reading_at("A", 5.0), reading_at("B", 5.0), reading_at("C", 7.07)];

        let result = solve(&readings, &table).solved().unwrap();
        assert!(result.position.is_finite());
        assert!(result.position.distance_to(&Position::new(4.727, 2.741)) < 0.05);
        assert!(result.residual_rms > 0.1);
    }

    #[test]
    fn test_selection_keeps_three_nearest_and_farthest() {
        let ranges = vec![
            range("far", 30.0),
            range("n1", 1.0),
            range("mid", 20.0),
            range("n3", 3.0),
            range("n2", 2.0),
        ];
        let selected = SelectionPolicy::NearestPlusFarthest.select(ranges.clone());
        let names: Vec<_> = selected.iter().map(|r| r.station_id.as_str()).collect();
        assert_eq!(names, vec!["n1", "n2", "n3", "far"]);

        let all = SelectionPolicy::AllStations.select(ranges);
        assert_eq!(all.len(), 5);

        // Three or fewer are kept as they are
        let few = SelectionPolicy::NearestPlusFarthest.select(vec![range("a", 2.0), range("b", 1.0)]);
        assert_eq!(few.len(), 2);
    }

    #[test]
    fn test_second_farthest_station_is_ignored() {
        let table = stations(&[
            ("A", 0.0, 0.0),
            ("B", 10.0, 0.0),
            ("C", 0.0, 10.0),
            ("D", 10.0, 10.0),
            ("E", 20.0, 20.0),
        ]);
        let truth = Position::new(3.0, 4.0);
        let readings = exact_readings(&table, &["A", "B", "C", "D", "E"], truth);
        let base = solve(&readings, &table).solved().unwrap();
        assert_eq!(base.stations_used, vec!["A", "C", "B", "E"]);

        // D ranks fourth of five (9.2 m); move it to 12 m, still fourth
        let mut moved_d = readings.clone();
        moved_d[3] = reading_at("D", 12.0);
        let result = solve(&moved_d, &table).solved().unwrap();
        assert_eq!(result.position, base.position);

        // E is the farthest (23.3 m); moving it changes the fix
        let mut moved_e = readings.clone();
        moved_e[4] = reading_at("E", 22.0);
        let result = solve(&moved_e, &table).solved().unwrap();
        assert!(result.position.distance_to(&base.position) > 1e-3);
    }

    #[test]
    fn test_all_stations_policy_uses_every_range() {
        let table = stations(&[
            ("A", 0.0, 0.0),
            ("B", 10.0, 0.0),
            ("C", 0.0, 10.0),
            ("D", 10.0, 10.0),
            ("E", 20.0, 20.0),
        ]);
        let truth = Position::new(3.0, 4.0);
        let readings = exact_readings(&table, &["A", "B", "C", "D", "E"], truth);
        let solver = RobustWlsSolver::default().with_selection(SelectionPolicy::AllStations);

        let base = solver.solve(&readings, &table).solved().unwrap();
        assert_eq!(base.stations_used.len(), 5);
        assert!(base.position.distance_to(&truth) < 1e-3);

        let mut moved_d = readings.clone();
        moved_d[3] = reading_at("D", 12.0);
        let result = solver.solve(&moved_d, &table).solved().unwrap();
        assert!(result.position.distance_to(&base.position) > 1e-3);
    }

    #[test]
    fn test_collinear_stations_are_degenerate() {
        // Centroid lands on station B: its range is clamped, not divided by zero
        let table = stations(&[("A", 0.0, 0.0), ("B", 5.0, 0.0), ("C", 10.0, 0.0)]);
        let readings = vec![reading_at("A", 4.0), reading_at("B", 3.0), reading_at("C", 6.0)];

        match solve(&readings, &table) {
            SolveOutcome::Unsolvable(UnsolvableReason::DegenerateGeometry { determinant }) => {
                assert!(determinant.is_finite());
                assert!(determinant.abs() < SINGULAR_DETERMINANT_THRESHOLD);
            }
            other => panic!("expected degenerate geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_predicted_range_clamp_boundary() {
        assert_eq!(predicted_range(0.0, 0.0, MIN_PREDICTED_RANGE_M), MIN_PREDICTED_RANGE_M);
        assert_eq!(predicted_range(1e-7, 0.0, MIN_PREDICTED_RANGE_M), MIN_PREDICTED_RANGE_M);
        assert_eq!(predicted_range(2e-6, 0.0, MIN_PREDICTED_RANGE_M), 2e-6);
        assert_eq!(predicted_range(3.0, 4.0, MIN_PREDICTED_RANGE_M), 5.0);
    }

    #[test]
    fn test_singular_threshold_boundary() {
        // Singular strictly below the threshold
        let solver = RobustWlsSolver::default();
        let threshold = solver.config.singular_threshold;
        assert_eq!(threshold, 1e-9);

        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let readings = exact_readings(&table, &["A", "B", "C"], Position::new(3.0, 4.0));

        // A threshold above any achievable determinant turns the solve degenerate
        let strict = RobustWlsSolver::new(
            PathLossModel::default(),
            SolverConfig { singular_threshold: 1e6, ..SolverConfig::default() },
        );
        assert!(matches!(
            strict.solve(&readings, &table),
            SolveOutcome::Unsolvable(UnsolvableReason::DegenerateGeometry { .. })
        ));
        assert!(solver.solve(&readings, &table).is_solved());
    }

    #[test]
    fn test_singular_after_first_step_keeps_estimate() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let readings = exact_readings(&table, &["A", "B", "C"], Position::new(3.0, 4.0));
        let one_step = RobustWlsSolver::new(
            PathLossModel::default(),
            SolverConfig { max_iterations: 1, ..SolverConfig::default() },
        )
        .solve(&readings, &table)
        .solved()
        .unwrap();

        // Determinants are about 0.371 before and 0.338 after the first step
        let solver = RobustWlsSolver::new(
            PathLossModel::default(),
            SolverConfig { singular_threshold: 0.35, ..SolverConfig::default() },
        );
        let result = solver.solve(&readings, &table).solved().unwrap();
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert_eq!(result.position, one_step.position);
        assert!((result.position.x - 3.0295).abs() < 1e-3);
        assert!((result.position.y - 4.0333).abs() < 1e-3);
        assert_eq!(result.approx_covariance, None);
    }

    #[test]
    fn test_singular_threshold_at_first_determinant() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let readings = exact_readings(&table, &["A", "B", "C"], Position::new(3.0, 4.0));
        let first = RobustWlsSolver::new(
            PathLossModel::default(),
            SolverConfig { max_iterations: 1, ..SolverConfig::default() },
        )
        .solve(&readings, &table)
        .solved()
        .unwrap();
        let determinant = first.information.determinant().abs();

        let with_threshold = |singular_threshold: f64| {
            RobustWlsSolver::new(
                PathLossModel::default(),
                SolverConfig { singular_threshold, ..SolverConfig::default() },
            )
            .solve(&readings, &table)
        };

        // Singular only strictly below the threshold
        let at = with_threshold(determinant).solved().unwrap();
        assert_eq!(at.iterations, 1);
        assert!(!at.converged);

        assert!(matches!(
            with_threshold(determinant * (1.0 + 1e-9)),
            SolveOutcome::Unsolvable(UnsolvableReason::DegenerateGeometry { .. })
        ));
        assert!(with_threshold(determinant * (1.0 - 1e-9)).is_solved());
    }

    #[test]
    fn test_iteration_cap_is_respected() {
        let table = stations(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)]);
        let readings = exact_readings(&table, &["A", "B", "C"], Position::new(3.0, 4.0));
        let solver = RobustWlsSolver::new(
            PathLossModel::default(),
            SolverConfig { max_iterations: 1, ..SolverConfig::default() },
        );

        let result = solver.solve(&readings, &table).solved().unwrap();
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_huber_weight() {
        assert_eq!(huber_weight(0.5, 1.0, 2.0), 2.0);
        assert_eq!(huber_weight(1.0, 1.0, 2.0), 2.0);
        assert_eq!(huber_weight(-4.0, 1.0, 2.0), 0.5);
    }

    #[test]
    fn test_solver_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        let bad = SolverConfig { max_iterations: 0, ..SolverConfig::default() };
        assert!(bad.validate().is_err());
        let bad = SolverConfig { huber_scale: 0.0, ..SolverConfig::default() };
        assert!(bad.validate().is_err());
    }
}
