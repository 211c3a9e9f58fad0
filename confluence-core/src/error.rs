//! Typed errors for the engine.
//!
//! Insufficient history is not an error anywhere in the engine: indicators
//! fall back to NaN / neutral sentinels. Only invalid configuration and a
//! bar sequence with no usable price are hard failures.

use thiserror::Error;

use crate::data::DataError;

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field}: period list must not be empty")]
    EmptyPeriods { field: &'static str },

    #[error("{field}: periods must be positive")]
    NonPositivePeriod { field: &'static str },

    #[error("{field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("config parse error: {0}")]
    Parse(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    DataUnavailable(#[from] DataError),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
