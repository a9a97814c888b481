//! Error types for Docket core

use thiserror::Error;

use crate::types::AuthLevel;

/// Failures raised while validating a document or a path update.
///
/// These are reported verbatim to the caller and never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("No matching path: {0}")]
    NoMatchingPath(String),

    #[error("Invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl ValidationError {
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Token resolution and authorization failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient auth level: {required} required")]
    InsufficientAuthLevel { required: AuthLevel },

    #[error("No matching permission for {path} ({permission})")]
    NoMatchingPermission { path: String, permission: String },

    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid rule pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
