//! Error types for failover operations.

use fsfailover_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for failover operations.
pub type FailoverResult<T> = Result<T, FailoverError>;

/// Errors that can occur in failover, propagation and reconciliation.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// No failover group is registered under this name.
    #[error("failover group not found: {name}")]
    GroupNotFound {
        /// The requested group name.
        name: String,
    },

    /// The group has no backend at this index.
    #[error("backend index {index} not found in failover group {group}")]
    IndexNotFound {
        /// The group that was searched.
        group: String,
        /// The requested index.
        index: usize,
    },

    /// Every backend of the group failed a read or metadata lookup.
    #[error("{operation} failed on every backend for {path}")]
    AllBackendsFailed {
        /// The operation that was attempted.
        operation: &'static str,
        /// The path it was attempted on.
        path: String,
    },

    /// No backend of the group accepted the write.
    #[error("no backend accepted the write to {path}")]
    WriteFailed {
        /// The path that could not be written.
        path: String,
    },

    /// The operation cannot be performed safely across a failover group.
    #[error("operation {operation} is not supported by a failover group")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// An argument had an invalid value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two groups were registered under the same name.
    #[error("duplicate failover group: {name}")]
    DuplicateGroup {
        /// The duplicated name.
        name: String,
    },

    /// A single backend operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The message bus refused or failed to deliver a message.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A message reached the configured retry ceiling.
    #[error("giving up on {kind} of {path} after {attempts} retries")]
    RetriesExhausted {
        /// Message kind.
        kind: &'static str,
        /// Path carried by the message.
        path: String,
        /// Number of retries already performed.
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FailoverError {
    /// Creates a [`FailoverError::GroupNotFound`].
    pub fn group_not_found(name: impl Into<String>) -> Self {
        Self::GroupNotFound { name: name.into() }
    }

    /// Returns true if the error comes from a stale message or lookup
    /// (unknown group or index) rather than a backend failure.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            FailoverError::GroupNotFound { .. } | FailoverError::IndexNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors() {
        assert!(FailoverError::group_not_found("media").is_lookup_error());
        assert!(FailoverError::IndexNotFound {
            group: "media".into(),
            index: 4
        }
        .is_lookup_error());
        assert!(!FailoverError::WriteFailed { path: "a".into() }.is_lookup_error());
    }

    #[test]
    fn error_display() {
        let err = FailoverError::AllBackendsFailed {
            operation: "read",
            path: "docs/a.txt".into(),
        };
        assert_eq!(err.to_string(), "read failed on every backend for docs/a.txt");

        let err = FailoverError::IndexNotFound {
            group: "media".into(),
            index: 3,
        };
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("media"));

        let err = FailoverError::UnsupportedOperation { operation: "move" };
        assert!(err.to_string().contains("move"));
    }
}
