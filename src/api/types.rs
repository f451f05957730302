//! Result types of the localization pipeline

use serde::Serialize;

use crate::algorithms::robust_wls::{SolveResult, UnsolvableReason};
use crate::core::Position;

/// How the returned position was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum Fix {
    /// The batch was solved and blended into the filter
    Corrected(SolveResult),
    /// The batch was unusable; the position is the filter prediction only
    DeadReckoned(UnsolvableReason),
}

/// Position produced for one measurement batch
#[derive(Debug, Clone, PartialEq)]
pub struct LocateOutcome {
    pub position: Position,
    pub fix: Fix,
}

impl LocateOutcome {
    pub fn is_corrected(&self) -> bool {
        matches!(self.fix, Fix::Corrected(_))
    }

    /// Raw solver position of this batch, before filtering
    pub fn measured_position(&self) -> Option<Position> {
        match &self.fix {
            Fix::Corrected(result) => Some(result.position),
            Fix::DeadReckoned(_) => None,
        }
    }

    pub fn summary(&self) -> PositionSummary {
        PositionSummary {
            x: self.position.x,
            y: self.position.y,
            corrected: self.is_corrected(),
            stations_used: match &self.fix {
                Fix::Corrected(result) => result.stations_used.clone(),
                Fix::DeadReckoned(_) => Vec::new(),
            },
        }
    }
}

/// Flat, serializable view of an outcome for the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub x: f64,
    pub y: f64,
    pub corrected: bool,
    pub stations_used: Vec<String>,
}
