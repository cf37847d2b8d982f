//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster could not be reached or the request could not be sent.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The addressed index, alias or task does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The cluster rejected the request.
    #[error("rejected with status {status}: [{kind}] {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Cluster error type (e.g. `mapper_parsing_exception`).
        kind: String,
        /// Cluster error reason.
        reason: String,
    },

    /// The response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Whether this error means the addressed resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this error means the target already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Whether the request never produced a cluster answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_decode() {
            Error::InvalidResponse(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidResponse(err.to_string())
    }
}
