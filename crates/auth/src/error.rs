//! Startup configuration errors.

use thiserror::Error;

use crate::KeyError;

/// Result type for building the authorization engine.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A configuration the engine refuses to start with.
///
/// None of these are per-request conditions: they are raised while building
/// the engine, before any request is served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("operation '{operation}' references unregistered policy '{policy}'")]
    UnresolvedPolicy { operation: String, policy: String },

    #[error("policy '{0}' is registered more than once")]
    DuplicatePolicy(String),

    #[error("operation '{0}' is declared more than once")]
    DuplicateOperation(String),

    #[error("policy '{policy}' is invalid: {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("no verification keys configured")]
    NoKeys,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
