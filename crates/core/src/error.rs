//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, PartialEq)]
pub enum CoreError {
    /// Content identifier is not a 32-byte hex string.
    #[error("Invalid cid: {0}")]
    InvalidCid(String),

    /// Fixed-point decimals out of range.
    #[error("Invalid decimals: {0} (must be at most {max})", max = crate::constants::MAX_DECIMALS)]
    InvalidDecimals(u8),

    /// Score parameter is negative, NaN, or infinite.
    #[error("Invalid score parameter {name}: {value}")]
    InvalidScoreParam {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Unknown score formula preset.
    #[error("Unknown score preset: {0} (expected 'raw' or 'weighted')")]
    UnknownPreset(String),

    /// A mirrored decimal quantity could not be parsed.
    #[error("Invalid decimal quantity: {0}")]
    InvalidQuantity(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
