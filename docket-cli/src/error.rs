//! CLI Error Types

use docket_broker::BrokerError;
use docket_cluster::ClusterError;
use docket_core::CoreError;
use docket_db::DbError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Core error
    #[error("Core error: {0}")]
    CoreError(#[from] CoreError),

    /// Store error
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    /// Broker error
    #[error("Broker error: {0}")]
    BrokerError(#[from] BrokerError),

    /// Cluster error
    #[error("Cluster error: {0}")]
    ClusterError(#[from] ClusterError),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
            CliError::CoreError(_) => 12,
            CliError::DatabaseError(_) => 31,
            CliError::BrokerError(_) => 32,
            CliError::ClusterError(_) => 33,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("unknown log level: loud");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_wrapped_errors_keep_their_message() {
        let err = CliError::from(DbError::Storage("disk full".to_string()));
        assert_eq!(err.exit_code(), 31);
        assert!(err.to_string().contains("disk full"));

        let err = CliError::from(BrokerError::UnknownBroker("redis://x".to_string()));
        assert_eq!(err.exit_code(), 32);
    }
}
