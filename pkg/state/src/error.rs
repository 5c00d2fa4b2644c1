use pkg_types::meta::ObjectKey;
use thiserror::Error;

/// Failures of typed object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error(
        "{kind} '{key}' has been modified: resourceVersion {expected} is stale (current {current})"
    )]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        expected: u64,
        current: u64,
    },

    #[error("{kind} '{key}' is invalid: {reason:#}")]
    Invalid {
        kind: &'static str,
        key: ObjectKey,
        reason: anyhow::Error,
    },

    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
