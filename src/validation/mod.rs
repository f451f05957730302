//! Error types

pub mod error;

pub use error::{BatchError, ConfigError};
