//! Core error types for c2station-core.
//!
//! Every concern gets its own `thiserror` enum; [`CoreError`] wraps them for
//! callers that only want a single type to bubble up (the CLI does).

use std::path::PathBuf;
use thiserror::Error;

use crate::schedule::OperationStatus;

/// Core error type for c2station-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Remote call failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Caller-supplied input rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Scheduled-operation lifecycle errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified outcome of a failed remote call.
///
/// The gateway never panics or propagates transport errors as-is; every
/// failure ends up as exactly one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure or request timeout.
    #[error("network error: {0}")]
    Network(String),

    /// 401 with a failed or absent refresh. The session has been cleared.
    #[error("authentication expired, please log in again")]
    AuthExpired,

    /// 4xx response, carrying the server-supplied detail.
    #[error("bad request ({status}): {detail}")]
    BadRequest { status: u16, detail: String },

    /// 5xx response (or a success response whose body could not be read).
    #[error("server error ({status}): {detail}")]
    ServerError { status: u16, detail: String },
}

impl GatewayError {
    /// Stable short label, used in logs and in the operation history.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => "network_error",
            GatewayError::AuthExpired => "auth_expired",
            GatewayError::BadRequest { .. } => "bad_request",
            GatewayError::ServerError { .. } => "server_error",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Network(format!("request timed out: {err}"))
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Validation errors for scheduling input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duration must be a positive number of minutes, got {0}")]
    NonPositiveDuration(i64),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Scheduled-operation lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("scheduled operation '{0}' not found")]
    NotFound(String),

    /// Only pending operations can be cancelled.
    #[error("scheduled operation '{id}' is {status} and can no longer be cancelled")]
    NotCancellable { id: String, status: OperationStatus },
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
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Could not locate or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Registry persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read/write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed registry file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A running console owns the data directory.
    #[error("a console (pid {holder}) is running on this data directory; send commands on its stdin, or remove {path} if it is stale")]
    Locked { path: PathBuf, holder: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_kinds_are_stable() {
        assert_eq!(GatewayError::AuthExpired.kind(), "auth_expired");
        assert_eq!(GatewayError::Network("x".into()).kind(), "network_error");
        assert_eq!(
            GatewayError::BadRequest { status: 422, detail: "nope".into() }.kind(),
            "bad_request"
        );
    }

    #[test]
    fn not_cancellable_message_names_status() {
        let err = ScheduleError::NotCancellable {
            id: "SCHED-1".into(),
            status: OperationStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "scheduled operation 'SCHED-1' is active and can no longer be cancelled"
        );
    }

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::NonPositiveDuration(0).into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
