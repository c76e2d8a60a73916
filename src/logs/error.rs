use std::time::Duration;

use thiserror::Error;

use super::types::LogEntry;

/// Input rejected before touching any store
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unknown level '{0}', expected one of debug, info, success, warning, error")]
    UnknownLevel(String),

    #[error("source is {0} characters long, limit is 64")]
    SourceTooLong(usize),

    #[error("offset {0} is out of range")]
    OffsetOutOfRange(usize),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failure of a single store operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("in-memory store cannot hold any entry (capacity {0})")]
    CapacityExhausted(usize),

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Whether the backend could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Errors surfaced by [`LogService`](super::LogService)
#[derive(Debug, Error)]
pub enum LogError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("log store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Both the durable and the in-memory append failed. The entry only
    /// reached the audit sink.
    #[error("entry {} could not be stored: {reason}", .entry.id)]
    FallbackExhausted {
        entry: Box<LogEntry>,
        #[source]
        reason: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
