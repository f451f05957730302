//! Ranging and positioning algorithms

pub mod path_loss;
pub mod robust_wls;

pub use path_loss::PathLossModel;
pub use robust_wls::{
    huber_weight, solve, RobustWlsSolver, SelectionPolicy, SolveOutcome, SolveResult, SolverConfig,
    UnsolvableReason,
};
