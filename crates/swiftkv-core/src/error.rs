//! Error types for object-storage operations
//!
//! Every failure reported by an [`ObjectStore`](crate::ObjectStore) backend is
//! a [`StoreError`]. Callers match on the variant, never on the message.

use thiserror::Error;

/// Object-storage error types with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The named object does not exist in the container
    #[error("object not found: {container}/{name}")]
    ObjectNotFound {
        /// Container that was searched
        container: String,
        /// Object name that was requested
        name: String,
    },

    /// The container does not exist (or is not visible to this account)
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Authentication against the auth endpoint failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or server-side failure talking to the object store
    #[error("transport error: {0}")]
    Transport(String),

    /// Bulk archive is malformed
    #[error("archive corrupted at offset {offset}: {reason}")]
    Archive {
        /// Byte offset of the offending header or record
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// Entry size exceeds what the archive format can carry
    #[error("entry {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        /// Size of the oversized entry
        entry_size: u64,
        /// Maximum allowed size
        max_size: u64,
        /// Which part of the entry is oversized ("name" or "value")
        component: String,
    },

    /// A bulk call completed but reported per-entry failures
    #[error("bulk {operation} failed for {failed} entries: {detail}")]
    BulkFailure {
        /// "upload" or "delete"
        operation: &'static str,
        /// Number of entries that failed
        failed: usize,
        /// First failure reported by the backend
        detail: String,
    },

    /// Configuration rejected during validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local I/O failure while buffering
    #[error("I/O error: {message} ({kind})")]
    Io {
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },
}

impl StoreError {
    /// True for [`StoreError::ObjectNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ObjectNotFound { .. })
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for object-storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ObjectNotFound {
            container: "blocks".into(),
            name: "a/b".into(),
        };
        assert_eq!(err.to_string(), "object not found: blocks/a/b");

        let err = StoreError::BulkFailure {
            operation: "delete",
            failed: 2,
            detail: "a/b: 409 Conflict".into(),
        };
        let display = format!("{}", err);
        assert!(display.contains("bulk delete"));
        assert!(display.contains("2 entries"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let store_err: StoreError = io_err.into();

        match store_err {
            StoreError::Io { kind, .. } => assert_eq!(kind, std::io::ErrorKind::UnexpectedEof),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::ObjectNotFound { container: "c".into(), name: "n".into() }.is_not_found());
        assert!(!StoreError::ContainerNotFound("c".into()).is_not_found());
        assert!(!StoreError::Transport("reset".into()).is_not_found());
    }
}
