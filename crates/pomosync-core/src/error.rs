//! Core error types for pomosync-core.
//!
//! This module defines the error hierarchy using thiserror. Remote failures
//! are classified once, in [`ApiError`], so the sync engine can decide between
//! retrying, falling back to cached data, or staying silent.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomosync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Synchronization errors that escape the sync engine
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Local cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified failure of a call to the remote persistence service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401: no valid session. Expected, never shown to the user.
    #[error("Not signed in")]
    Unauthorized,

    /// 5xx: the service is degraded.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Any other 4xx.
    #[error("Request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// Transport-level failure (connect, reset, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify an HTTP status code that is not a success.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ApiError::Unauthorized,
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Client { status, message },
        }
    }

    /// 5xx or network-class failures are worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. } | ApiError::Network(_))
    }

    /// Only a 5xx escalates the refresh throttle.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Server { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Errors surfaced by the sync engine's public operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A mutating operation was attempted without a credential.
    #[error("Not signed in: sign in to save sessions")]
    Unauthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors raised by on-disk client caches.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to write cache {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode cache: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ApiError::from_status(401, "x"), ApiError::Unauthorized);
        assert!(ApiError::from_status(503, "down").is_server_error());
        assert!(ApiError::from_status(503, "down").is_retryable());
        assert!(!ApiError::from_status(404, "missing").is_retryable());
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(!ApiError::Network("reset".into()).is_server_error());
        assert!(!ApiError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn sync_error_wraps_api_error() {
        let err: SyncError = ApiError::Network("timed out".into()).into();
        assert_eq!(err.to_string(), "Network error: timed out");
    }
}
