//! Error types for endpoint synthesis

use meshlet_core::MeshletError;
use thiserror::Error;

/// Errors that abort a synthesis call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XdsError {
    /// Missing snapshot or a service kind this crate cannot serve
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for synthesis operations
pub type XdsResult<T> = Result<T, XdsError>;

impl From<XdsError> for MeshletError {
    fn from(err: XdsError) -> Self {
        match err {
            XdsError::InvalidInput(msg) => MeshletError::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_meshlet_error() {
        let err: MeshletError = XdsError::InvalidInput("nil config given".to_string()).into();
        assert!(matches!(err, MeshletError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid input: nil config given");
    }
}
