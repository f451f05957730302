//! Core types and constants for the localization engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
