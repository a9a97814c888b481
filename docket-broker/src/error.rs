//! Broker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Broker closed")]
    Closed,

    #[error("Unknown broker: {0}")]
    UnknownBroker(String),
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;
