//! Error types for the Vergate core library
//!
//! One error enum covers the whole engine, using thiserror for ergonomic
//! definitions and anyhow for opaque error sources.

use thiserror::Error;

use crate::features::Feature;
use crate::transport::TransportError;
use crate::version::ApiVersion;

/// Main error type for Vergate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed version string
    #[error("Invalid version string '{input}': {message}")]
    Parse { input: String, message: String },

    /// The diagnostic call could not produce a usable version
    #[error("Version detection failed: {message}")]
    Detection {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// No adaptation rule covers the operation at the detected version
    #[error("Operation '{operation}' is not supported by server version {version}")]
    UnsupportedOperation {
        operation: String,
        version: ApiVersion,
    },

    /// A feature gate sits above the detected version
    #[error("Feature '{feature}' requires server version >= {required} (server is {version})")]
    FeatureNotSupported {
        feature: Feature,
        version: ApiVersion,
        required: ApiVersion,
    },

    /// Transport collaborator failure, passed through uninterpreted
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid rule tables or feature gates, fatal at construction
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Caller-supplied input that cannot be adapted
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors (rule files, config files)
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a configuration error without a source
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
