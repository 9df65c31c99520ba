//! Error types for zonesync
//!
//! This module defines all error types used throughout the crate, plus the
//! serializable [`FailureReason`] that is reported per key in a bulk result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RecordKey;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// A local, pre-network validation failure
///
/// `field` names the record attribute that failed (`name`, `type`, `data`,
/// `ttl`, `priority`, `weight`, `port`); `reason` is a human message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Record attribute that failed validation
    pub field: String,
    /// Human readable reason
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for a field
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A validation failure tied to the record-set key it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidEntry {
    /// Key of the offending record set
    pub key: RecordKey,
    /// First failing rule
    pub error: ValidationError,
}

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// A record failed local validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The desired state contained invalid entries and strict mode was on
    #[error("Desired state rejected: {} invalid record set(s)", failures.len())]
    InvalidDesiredState {
        /// Every invalid entry found
        failures: Vec<InvalidEntry>,
    },

    /// Credentials were rejected (HTTP 401/403) or are missing
    #[error("Authentication failed: {message}")]
    Authentication {
        /// HTTP status, if the provider answered
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// The target resource does not exist (HTTP 404)
    #[error("Not found: {message}")]
    NotFound {
        /// Error message
        message: String,
    },

    /// The provider rejected the request payload (HTTP 400/422)
    #[error("Request rejected ({status}): {message}")]
    InvalidRequest {
        /// HTTP status
        status: u16,
        /// Provider message
        message: String,
        /// Provider field-level detail, when present
        fields: Option<serde_json::Value>,
    },

    /// No rate budget available and the limiter is non-blocking
    #[error("Rate limit exhausted: {0}")]
    RateLimitExhausted(String),

    /// Retries exhausted, or an unexpected response
    #[error("Transport error after {attempts} attempt(s): {message}")]
    Transport {
        /// Last HTTP status seen, if any
        status: Option<u16>,
        /// Attempts made
        attempts: u32,
        /// Error message
        message: String,
    },

    /// The call was cancelled before it could complete
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Zone snapshot could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Public classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, local or provider-side
    Validation,
    /// Credentials rejected
    Auth,
    /// Target missing
    NotFound,
    /// Non-blocking limiter had no budget
    RateLimitExhausted,
    /// Network failure or retries exhausted
    Transport,
    /// Cancelled before completion
    Cancelled,
    /// Misconfiguration
    Config,
    /// Anything else
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimitExhausted => "rate_limit_exhausted",
            ErrorKind::Transport => "transport",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create an authentication error without an HTTP status
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication {
            status: None,
            message: msg.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimitExhausted(msg.into())
    }

    /// Create a transport error
    pub fn transport(status: Option<u16>, attempts: u32, msg: impl Into<String>) -> Self {
        Self::Transport {
            status,
            attempts,
            message: msg.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, reason))
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::InvalidDesiredState { .. } | Error::InvalidRequest { .. } => {
                ErrorKind::Validation
            }
            Error::Authentication { .. } => ErrorKind::Auth,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::RateLimitExhausted(_) => ErrorKind::RateLimitExhausted,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
            Error::Snapshot(_) | Error::Json(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// True for errors that invalidate every later call with the same credentials
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Structured, serializable description of why an operation failed
///
/// Carries the error kind, a human message, and the provider's field
/// detail when one was returned. Never contains raw provider payloads
/// beyond that detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
    /// Provider field detail, or the local field name for validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        let detail = match err {
            Error::InvalidRequest { fields, .. } => fields.clone(),
            Error::Validation(v) => Some(serde_json::json!({ "field": v.field })),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            detail,
        }
    }
}

impl From<&ValidationError> for FailureReason {
    fn from(err: &ValidationError) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: err.to_string(),
            detail: Some(serde_json::json!({ "field": err.field })),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
