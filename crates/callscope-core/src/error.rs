//! Error types for the callscope client layer

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the callscope client layer
#[derive(Error, Debug)]
pub enum Error {
    /// A record the caller asked for does not exist
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// The backend answered with an error
    #[error("Remote call failed: {message}")]
    Remote {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Human-readable message from the backend
        message: String,
    },

    /// Input rejected before any remote call was attempted
    #[error("Validation error: {field} - {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Durable client storage error
    #[error("Storage error: {message}")]
    Storage {
        /// Error message
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a remote error without an HTTP status
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// Create a remote error carrying the response status
    pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
