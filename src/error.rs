//! Error types for reference resolution
//!
//! This module defines the error type shared by the resolver registry, the
//! resolution engine and the cache. Errors are `Clone` so a failure recorded
//! once during batch execution can be raised at every place the failed
//! reference is read.

use thiserror::Error;

/// Main error type for resolution operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A single reference could not be resolved
    #[error("Failed to resolve {reference}: {message}")]
    Resolution { reference: String, message: String },

    /// A reference failed as part of a batch call
    #[error("Batch resolution failed for {reference} ({protocol}): {message}")]
    Batch {
        protocol: String,
        reference: String,
        message: String,
    },

    /// The string does not match the reference grammar or was rejected by its resolver
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// No resolver is registered for the protocol
    #[error("No resolver registered for protocol: {0}")]
    UnknownProtocol(String),

    /// Resolver initialization failed
    #[error("Resolver '{protocol}' failed to initialize: {message}")]
    Initialization { protocol: String, message: String },

    /// Resolver cleanup failed
    #[error("Resolver '{protocol}' failed to clean up: {message}")]
    Cleanup { protocol: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal cache failure (counted by the circuit breaker)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl ResolveError {
    /// Build a resolution error for a reference
    pub fn resolution(reference: impl Into<String>, message: impl Into<String>) -> Self {
        ResolveError::Resolution {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Build a batch error for a reference
    pub fn batch(
        protocol: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ResolveError::Batch {
            protocol: protocol.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

impl From<String> for ResolveError {
    fn from(s: String) -> Self {
        ResolveError::Other(s)
    }
}

impl From<&str> for ResolveError {
    fn from(s: &str) -> Self {
        ResolveError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        ResolveError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ResolveError::resolution("ssm:/app/key", "access denied");
        assert_eq!(
            error.to_string(),
            "Failed to resolve ssm:/app/key: access denied"
        );

        let batch_error = ResolveError::batch("ssm", "ssm:/p1", "throttled");
        assert!(batch_error.to_string().contains("(ssm)"));
        assert!(batch_error.to_string().contains("throttled"));

        let unknown = ResolveError::UnknownProtocol("vault".to_string());
        assert!(unknown.to_string().contains("vault"));
    }

    #[test]
    fn test_error_conversion() {
        let error: ResolveError = "test error".into();
        assert!(matches!(error, ResolveError::Other(_)));

        let error: ResolveError = "test error".to_string().into();
        assert!(matches!(error, ResolveError::Other(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: ResolveError = json_err.into();
        assert!(matches!(error, ResolveError::Serialization(_)));
    }

    #[test]
    fn test_error_is_clone() {
        let error = ResolveError::batch("s3", "s3://b/k", "boom");
        assert_eq!(error.clone(), error);
    }
}
