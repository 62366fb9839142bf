//! Error types for the store adapters and the recorder.

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a tabular store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The backend refused our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// No table exists for the requested category.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// Quota or rate limit rejection.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Any other rejection carrying the backend status.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The call did not return within the configured bound.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// Local storage engine failure.
    #[error("storage engine error: {0}")]
    Backend(String),
    /// Credential bundle could not be used to authenticate.
    #[error("credential error: {0}")]
    Credentials(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Outcomes of a recorder operation other than success.
///
/// `Duplicate` is an expected business result, not a system fault; the
/// HTTP layer maps it to its own status.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing required field: {field}")]
    Validation { field: &'static str },

    #[error("entry already recorded for {category} on {date} ({time})")]
    Duplicate {
        category: String,
        date: String,
        time: String,
    },

    #[error("failed to read records: {0}")]
    Read(#[source] StoreError),

    #[error("failed to write record: {0}")]
    Write(#[source] StoreError),
}

impl RecordError {
    /// The underlying store failure, if any
    pub fn store_cause(&self) -> Option<&StoreError> {
        match self {
            RecordError::Read(cause) | RecordError::Write(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Fatal startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {message}")]
    Invalid { name: &'static str, message: String },
}
