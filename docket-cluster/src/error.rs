//! Cluster error types

use docket_broker::BrokerError;
use docket_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Worker {0} is not running")]
    WorkerGone(usize),

    #[error("Worker {0} queue is full")]
    WorkerBusy(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
