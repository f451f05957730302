//! Localization pipeline entry points
//!
//! - `blocking`: one synchronous predict/solve/update step per batch
//! - `session`: route-recording lifecycle around a localizer

pub mod blocking;
pub mod session;
pub mod types;

pub use blocking::{locate, locate_with, Localizer};
pub use session::{RouteState, SessionUpdate, TrackingSession};
pub use types::{Fix, LocateOutcome, PositionSummary};
