//! Error types for meshlet

use thiserror::Error;

/// Main error type for meshlet
#[derive(Error, Debug)]
pub enum MeshletError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller handed over a request that can never succeed as-is
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No compiled discovery chain exists for the service
    #[error("Discovery chain not found for {0:?}")]
    ChainNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MeshletError {
    fn from(err: serde_json::Error) -> Self {
        MeshletError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeshletError {
    fn from(err: toml::de::Error) -> Self {
        MeshletError::Config(err.to_string())
    }
}
