//! Error types for the reconciliation pipeline
//!
//! Every component returns `CollectorResult` instead of logging and
//! swallowing; only the dispatcher converts errors, and into an explicit
//! message disposition rather than a silent no-op.

use thiserror::Error;

/// Errors produced while reconciling a billing event message
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A required field was absent from the inbound message.
    /// Aborts the message with no writes performed.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The message `status` is absent or not in the recognized set
    #[error("unknown message status: {0:?}")]
    UnknownStatus(Option<String>),

    /// Any failure while querying or writing the store. Aborts the current
    /// unit of work only; already-committed sibling writes stay committed.
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type CollectorResult<T> = Result<T, CollectorError>;
