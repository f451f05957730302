//! Temporal filtering and batch decoding

pub mod kalman;
pub mod parser;

pub use kalman::{FilterConfig, FilterState, MotionFilter, PositionKalmanFilter};
pub use parser::{decode_batch, decode_batch_bytes, DecodedBatch};
