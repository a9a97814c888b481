//! Docket database error types

use docket_core::{CoreError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CoreError> for DbError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(v) => DbError::Validation(v),
            CoreError::Serialization(s) => DbError::Serialization(s),
            other => DbError::Schema(other.to_string()),
        }
    }
}

impl From<sled::Error> for DbError {
    fn from(e: sled::Error) -> Self {
        DbError::Storage(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
