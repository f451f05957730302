//! Decoding of measurement batches published by the scanner
//!
//! A batch is a JSON array of `{"name": string, "rssi": number}` objects.
//! Entries that do not match that shape are skipped one by one; only a
//! payload that is not a JSON array at all is rejected.

use serde_json::Value;
use tracing::warn;

use crate::core::StationMeasurement;
use crate::validation::BatchError;

/// Measurements recovered from one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub measurements: Vec<StationMeasurement>,
    /// Entries dropped as malformed
    pub skipped: usize,
}

/// Decode one JSON batch payload
pub fn decode_batch(payload: &str) -> Result<DecodedBatch, BatchError> {
    decode_value(serde_json::from_str(payload)?)
}

/// Decode raw payload bytes as delivered by the message channel
pub fn decode_batch_bytes(payload: &[u8]) -> Result<DecodedBatch, BatchError> {
    decode_value(serde_json::from_slice(payload)?)
}

fn decode_value(value: Value) -> Result<DecodedBatch, BatchError> {
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(BatchError::NotAnArray {
                found: json_kind(&other),
            })
        }
    };

    let mut batch = DecodedBatch::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(entry) {
            Some(measurement) => batch.measurements.push(measurement),
            None => {
                warn!(index, "skipping malformed measurement entry");
                batch.skipped += 1;
            }
        }
    }
    Ok(batch)
}

fn decode_entry(entry: Value) -> Option<StationMeasurement> {
    let measurement: StationMeasurement = serde_json::from_value(entry).ok()?;
    if measurement.station_id.is_empty() || !measurement.rssi.is_finite() {
        return None;
    }
    Some(measurement)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
