//! Core error types for `Seatwatch`.

use thiserror::Error;

/// Core error type for parsing and validation in `Seatwatch`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The event URL carries no numeric resource id.
    #[error("Could not extract an event id from URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The proxy URL cannot be used.
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    /// Invalid data in a vendor payload.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
