//! Migration error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Coarse classification of a [`MigrationError`], for callers that branch on
/// the failure class rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The cluster could not be reached or answered unexpectedly.
    Transport,
    /// A name is taken, a mapping is invalid, or something expected is absent.
    Conflict,
    /// The task did not finish within its estimated ceiling.
    Timeout,
    /// The dataset is too large for an automatic migration.
    ScaleRefusal,
    /// The cluster reported that the reindex task failed.
    TaskFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ScaleRefusal => write!(f, "scale_refusal"),
            ErrorKind::TaskFailed => write!(f, "task_failed"),
        }
    }
}

/// Migration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A cluster request failed.
    #[error("{operation} failed: {source}")]
    Transport {
        /// What was being attempted.
        operation: String,
        /// Underlying client error.
        #[source]
        source: esmigrate_client::Error,
    },

    /// The index to create already exists.
    #[error("index {index} already exists")]
    IndexExists {
        /// The conflicting index.
        index: String,
    },

    /// The backup name for a bare index is already taken.
    #[error("rename target {index} already exists, resolve manually")]
    RenameTargetExists {
        /// The conflicting backup index.
        index: String,
    },

    /// The cluster rejected the mapping.
    #[error("mapping rejected for {index}: {reason}")]
    MappingRejected {
        /// The index being created.
        index: String,
        /// Cluster-reported reason.
        reason: String,
    },

    /// An index that must exist does not.
    #[error("index {index} not found")]
    IndexNotFound {
        /// The missing index.
        index: String,
    },

    /// The document count could not be read.
    #[error("document count of {index} unavailable: {source}")]
    CountUnavailable {
        /// The inspected index.
        index: String,
        /// Underlying client error.
        #[source]
        source: esmigrate_client::Error,
    },

    /// The dataset exceeds the automatic migration ceiling.
    #[error("{index} holds {doc_count} documents, above the automatic migration ceiling; migrate in batches")]
    ScaleRefusal {
        /// The source index.
        index: String,
        /// Its document count.
        doc_count: u64,
    },

    /// The reindex task finished with an error.
    #[error("task {task_id} failed: {error}")]
    TaskFailed {
        /// Task id.
        task_id: String,
        /// Error reported by the cluster.
        error: Value,
    },

    /// The reindex task did not finish in time. It keeps running on the cluster.
    #[error("task {task_id} did not complete within {timeout:?}")]
    Timeout {
        /// Task id.
        task_id: String,
        /// The ceiling that was exceeded.
        timeout: Duration,
    },
}

impl MigrationError {
    /// Wrap a client error raised while performing `operation`.
    pub fn transport(operation: impl Into<String>, source: esmigrate_client::Error) -> Self {
        MigrationError::Transport {
            operation: operation.into(),
            source,
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Transport { .. } | MigrationError::CountUnavailable { .. } => {
                ErrorKind::Transport
            }
            MigrationError::IndexExists { .. }
            | MigrationError::RenameTargetExists { .. }
            | MigrationError::MappingRejected { .. }
            | MigrationError::IndexNotFound { .. } => ErrorKind::Conflict,
            MigrationError::ScaleRefusal { .. } => ErrorKind::ScaleRefusal,
            MigrationError::TaskFailed { .. } => ErrorKind::TaskFailed,
            MigrationError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Result alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kinds() {
        let transport = MigrationError::transport(
            "get task",
            esmigrate_client::Error::Transport("connection refused".into()),
        );
        assert_eq!(transport.kind(), ErrorKind::Transport);
        assert_eq!(
            MigrationError::RenameTargetExists { index: "p_backup".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            MigrationError::ScaleRefusal { index: "p".into(), doc_count: 150_000_000 }.kind(),
            ErrorKind::ScaleRefusal
        );
        assert_eq!(
            MigrationError::TaskFailed { task_id: "n:1".into(), error: json!({}) }.kind(),
            ErrorKind::TaskFailed
        );
        assert_eq!(
            MigrationError::Timeout { task_id: "n:1".into(), timeout: Duration::from_secs(300) }
                .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_error_display() {
        let err = MigrationError::transport(
            "launch reindex",
            esmigrate_client::Error::Timeout,
        );
        assert_eq!(err.to_string(), "launch reindex failed: request timed out");
        assert_eq!(ErrorKind::ScaleRefusal.to_string(), "scale_refusal");
    }
}
