use sea_orm::DbErr;
use thiserror::Error;

use crate::cache::CacheError;
use crate::driver::DriverError;

/// Failure kinds surfaced to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Denied,
    Failed,
    PoolExhausted,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("operation denied: {0}")]
    Denied(String),

    #[error("flag pool of challenge {challenge_id} is exhausted")]
    PoolExhausted { challenge_id: i32 },

    #[error("container driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Denied(_) | EngineError::Driver(DriverError::Refused(_)) => {
                ErrorKind::Denied
            }
            EngineError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            EngineError::Driver(_)
            | EngineError::Database(_)
            | EngineError::Cache(_)
            | EngineError::Cancelled => ErrorKind::Failed,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }

    pub(crate) fn denied(why: impl Into<String>) -> Self {
        EngineError::Denied(why.into())
    }
}
