//! Generic key-value datastore contract.
//!
//! Any datastore consumer can be written against these traits; the Swift
//! backend is one implementation.

use crate::error::DatastoreResult;
use crate::key::Key;
use crate::query::{Entry, Query};

/// Basic key-value access plus prefix queries.
pub trait Datastore {
    /// Lazy result sequence returned by [`Datastore::query`]
    type Results: Iterator<Item = DatastoreResult<Entry>>;

    /// Value stored under `key`, `NotFound` if absent.
    fn get(&self, key: &Key) -> DatastoreResult<Vec<u8>>;

    /// Whether `key` exists. Absence is `Ok(false)`, not an error.
    fn has(&self, key: &Key) -> DatastoreResult<bool>;

    /// Size of the value stored under `key`, `NotFound` if absent.
    fn get_size(&self, key: &Key) -> DatastoreResult<usize>;

    /// Create or replace the value under `key`.
    ///
    /// Fails with `InvalidKey` without touching the store when the key is
    /// not storable (see [`Key::is_storable`]).
    fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &Key) -> DatastoreResult<()>;

    /// Start a prefix query.
    fn query(&self, query: Query) -> DatastoreResult<Self::Results>;

    /// Flush writes under `prefix`.
    fn sync(&self, prefix: &Key) -> DatastoreResult<()>;

    /// Release resources.
    fn close(&self) -> DatastoreResult<()>;
}

/// Datastores that can group mutations.
pub trait Batching: Datastore {
    type Batch: Batch;

    fn batch(&self) -> DatastoreResult<Self::Batch>;
}

/// Buffered mutations applied by one `commit`.
///
/// Nothing reaches the store before `commit`, which consumes the batch.
pub trait Batch {
    fn put(&mut self, key: &Key, value: &[u8]) -> DatastoreResult<()>;

    fn delete(&mut self, key: &Key) -> DatastoreResult<()>;

    fn commit(self) -> DatastoreResult<()>;
}

/// Datastores that can report their storage footprint.
pub trait PersistentDatastore: Datastore {
    /// Bytes used by all stored values.
    fn disk_usage(&self) -> DatastoreResult<u64>;
}
