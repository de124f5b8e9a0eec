//! Store error types.

use seatwatch_core::{CoreError, PipelineError};
use thiserror::Error;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`crate::Config`].
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be written as TOML.
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The `.env` file could not be read.
    #[error("Failed to load .env: {0}")]
    Env(#[from] dotenvy::Error),

    /// A value parsed but is not acceptable (unknown provider, bad URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A core type rejected a value.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}
