//! Route-recording session around one tracked tag
//!
//! A session is either waiting or recording a route. Starting a route
//! reinitializes the filter; batches are only located while recording.

use tracing::{debug, info};

use crate::api::blocking::Localizer;
use crate::api::types::LocateOutcome;
use crate::core::StationMeasurement;
use crate::processing::kalman::{FilterState, MotionFilter};
use crate::processing::parser::decode_batch;
use crate::utils::stations::{SharedStations, StationTable};
use crate::validation::BatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteState {
    #[default]
    Waiting,
    Recording,
}

/// Result of processing one wire payload
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub outcome: LocateOutcome,
    /// Malformed entries dropped from the payload
    pub skipped: usize,
}

/// Owns the filter state of one tag; serialize all calls on a session
#[derive(Debug, Clone)]
pub struct TrackingSession<F: MotionFilter = FilterState> {
    localizer: Localizer<F>,
    state: RouteState,
    batches_located: u64,
}

impl<F: MotionFilter> TrackingSession<F> {
    pub fn new(localizer: Localizer<F>) -> Self {
        Self {
            localizer,
            state: RouteState::Waiting,
            batches_located: 0,
        }
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RouteState::Recording
    }

    /// Number of batches located during the current route
    pub fn batches_located(&self) -> u64 {
        self.batches_located
    }

    pub fn localizer(&self) -> &Localizer<F> {
        &self.localizer
    }

    /// Begin a new route from a freshly initialized filter
    pub fn start_route(&mut self) {
        self.localizer.reset();
        self.batches_located = 0;
        self.state = RouteState::Recording;
        info!("route recording started");
    }

    pub fn finish_route(&mut self) {
        if self.state == RouteState::Recording {
            info!(batches = self.batches_located, "route recording finished");
        }
        self.state = RouteState::Waiting;
    }

    /// Locate an already decoded batch; `None` while no route is recorded
    pub fn process_batch(
        &mut self,
        measurements: &[StationMeasurement],
        stations: &StationTable,
    ) -> Option<LocateOutcome> {
        if !self.is_recording() {
            debug!(readings = measurements.len(), "ignoring batch outside of a route");
            return None;
        }
        self.batches_located += 1;
        Some(self.localizer.locate_detailed(measurements, stations))
    }

    /// Decode a wire payload and locate it against the current station table
    pub fn process_payload(
        &mut self,
        payload: &str,
        stations: &SharedStations,
    ) -> Result<Option<SessionUpdate>, BatchError> {
        if !self.is_recording() {
            debug!("ignoring payload outside of a route");
            return Ok(None);
        }
        let batch = decode_batch(payload)?;
        let table = stations.snapshot();
        Ok(self
            .process_batch(&batch.measurements, &table)
            .map(|outcome| SessionUpdate {
                outcome,
                skipped: batch.skipped,
            }))
    }
}

impl Default for TrackingSession<FilterState> {
    fn default() -> Self {
        Self::new(Localizer::default())
    }
}
