use thiserror::Error;

use crate::types::{NaturalKey, ScopeKey};

/// Failures raised by the persistent store and its derived sessions.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Mutation rejected for {entity} {key} in {scope}: {reason}")]
    Rejected {
        entity: String,
        scope: ScopeKey,
        key: NaturalKey,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Derived session is closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The error delivered through an action's completion.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Dispatch to an unregistered action kind, a store receiving a foreign
    /// action family, or action inputs no remote call could satisfy.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote error: {0}")]
    Remote(#[source] anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected remote result: {0}")]
    UnexpectedResult(String),

    #[error("Action was cancelled before completing")]
    Cancelled,
}

impl StoreError {
    pub fn remote(error: impl Into<anyhow::Error>) -> Self {
        Self::Remote(error.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
