//! Datastore implementation over a Swift-style container.

use std::sync::Arc;

use tracing::info;

use swiftkv_core::{CancellationToken, ObjectStore, StoreConfig, StoreError, OCTET_STREAM};

use crate::batch::SwiftBatch;
use crate::cache::{CursorCache, SingleSlotCache};
use crate::cursor::QueryResults;
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::query::Query;
use crate::traits::{Batching, Datastore, PersistentDatastore};

/// Key-value datastore storing each key as one object of a container.
///
/// Every operation is a blocking call to the object store on the caller's
/// thread. The datastore itself only owns the cursor cache, so it can be
/// shared freely behind an `Arc`.
pub struct SwiftDatastore {
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CursorCache>,
    container: String,
    page_size: usize,
}

impl SwiftDatastore {
    /// Validate `config`, authenticate and check that the container exists.
    pub fn open(config: &StoreConfig, store: Arc<dyn ObjectStore>) -> DatastoreResult<Self> {
        config.validate().map_err(StoreError::InvalidConfig)?;
        store.authenticate()?;
        let info = store.container(&config.container)?;

        info!(
            container = %config.container,
            page_size = config.page_size,
            objects = info.object_count,
            "swift datastore opened"
        );

        Ok(Self {
            store,
            cache: Arc::new(SingleSlotCache::new()),
            container: config.container.clone(),
            page_size: config.page_size,
        })
    }

    /// Replace the default single-slot cursor cache.
    pub fn with_cache(mut self, cache: Arc<dyn CursorCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cache(&self) -> &Arc<dyn CursorCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Like [`Datastore::query`], stopping at the next page fetch once `cancel` fires.
    pub fn query_with_cancellation(&self, query: Query, cancel: CancellationToken) -> DatastoreResult<QueryResults> {
        QueryResults::start(
            query,
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.container.clone(),
            self.page_size,
            cancel,
        )
    }

    fn missing(key: &Key, err: StoreError) -> DatastoreError {
        if err.is_not_found() {
            DatastoreError::NotFound(key.clone())
        } else {
            err.into()
        }
    }
}

/// Object sizes come back as u64; reject anything the platform cannot index.
fn checked_size(bytes: u64) -> DatastoreResult<usize> {
    if bytes > isize::MAX as u64 {
        return Err(DatastoreError::Overflow { size: bytes });
    }
    Ok(bytes as usize)
}

impl Datastore for SwiftDatastore {
    type Results = QueryResults;

    fn get(&self, key: &Key) -> DatastoreResult<Vec<u8>> {
        self.store
            .get_object(&self.container, key.name())
            .map_err(|e| Self::missing(key, e))
    }

    fn has(&self, key: &Key) -> DatastoreResult<bool> {
        match self.store.stat_object(&self.container, key.name()) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn get_size(&self, key: &Key) -> DatastoreResult<usize> {
        let info = self
            .store
            .stat_object(&self.container, key.name())
            .map_err(|e| Self::missing(key, e))?;
        checked_size(info.bytes)
    }

    fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
        if !key.is_storable() {
            return Err(DatastoreError::InvalidKey(key.clone()));
        }
        self.cache.invalidate();
        self.store.put_object(&self.container, key.name(), value, OCTET_STREAM)?;
        Ok(())
    }

    fn delete(&self, key: &Key) -> DatastoreResult<()> {
        if !key.is_storable() {
            return Ok(());
        }
        self.cache.invalidate();
        match self.store.delete_object(&self.container, key.name()) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn query(&self, query: Query) -> DatastoreResult<QueryResults> {
        self.query_with_cancellation(query, CancellationToken::new())
    }

    fn sync(&self, _prefix: &Key) -> DatastoreResult<()> {
        // Every write is durable once the store acknowledges it.
        Ok(())
    }

    fn close(&self) -> DatastoreResult<()> {
        Ok(())
    }
}

impl Batching for SwiftDatastore {
    type Batch = SwiftBatch;

    fn batch(&self) -> DatastoreResult<SwiftBatch> {
        Ok(SwiftBatch::new(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.container.clone(),
        ))
    }
}

impl PersistentDatastore for SwiftDatastore {
    fn disk_usage(&self) -> DatastoreResult<u64> {
        Ok(self.store.container(&self.container)?.bytes)
    }
}

impl std::fmt::Debug for SwiftDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwiftDatastore")
            .field("container", &self.container)
            .field("page_size", &self.page_size)
            .finish()
    }
}
