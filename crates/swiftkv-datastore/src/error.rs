//! Datastore error types.

use swiftkv_core::StoreError;
use thiserror::Error;

use crate::key::Key;

/// Errors surfaced by the datastore contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatastoreError {
    /// The key is absent.
    #[error("datastore: key not found: {0}")]
    NotFound(Key),

    /// The key maps to an object name the store cannot hold.
    #[error("datastore: key cannot be stored: {}", .0.as_str().escape_debug())]
    InvalidKey(Key),

    /// The query asked for filters or orders, which listing cannot provide.
    #[error("datastore: unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Object size does not fit the platform's signed size type.
    #[error("datastore: object size {size} overflows isize")]
    Overflow { size: u64 },

    /// The caller's cancellation token fired during a scan.
    #[error("datastore: query cancelled")]
    Cancelled,

    /// Anything the object store reported, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DatastoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatastoreError::NotFound(_))
    }
}

pub type DatastoreResult<T> = Result<T, DatastoreError>;
