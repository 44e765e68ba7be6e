//! SwiftKV Core: Object-Storage Capability Layer
//!
//! Everything SwiftKV needs from a Swift-style object store, with no knowledge
//! of the key-value contract built on top of it.
//!
//! # Architecture
//!
//! - **Capability**: the [`ObjectStore`] trait: per-object CRUD, marker-based
//!   listing, bulk upload (tar) and bulk delete
//! - **Archive codec**: ustar/PAX writer and reader for bulk uploads
//! - **In-memory backend**: a full `ObjectStore` over RAM, used for tests,
//!   benchmarks and embedding
//!
//! Datastore semantics (keys, queries, cursor caching, batches) live in
//! `swiftkv-datastore`.

pub mod archive;
pub mod config;
pub mod error;
pub mod memory;
pub mod object_store;

// Re-export key types for convenience
pub use archive::{ArchiveEntry, ArchiveFormat, ArchiveReader, ArchiveWriter};
pub use config::{ConnectionConfig, StoreConfig, DEFAULT_PAGE_SIZE};
pub use error::{StoreError, StoreResult};
pub use memory::{CallCounts, InMemoryObjectStore, StoreOp};
pub use object_store::{
    BulkDeleteResult, BulkUploadResult, ContainerInfo, ListOptions, ObjectInfo, ObjectStore,
    OCTET_STREAM,
};

/// Cooperative cancellation for long scans, shared with async callers.
pub use tokio_util::sync::CancellationToken;
