//! Archive-batched mutations.
//!
//! Puts are appended to an in-memory tar archive and deletes to a name list.
//! `commit` sends the archive in one bulk upload, then the names in one bulk
//! delete, so N puts and M deletes cost at most two calls.
//!
//! Operations on the same key resolve last-op-wins in batch order:
//! - put then delete: the delete runs after the upload and wins
//! - delete then put: the put drops the name from the pending deletes
//! - put then put: the later archive record overwrites the earlier one
//!
//! Keys the store cannot hold are rejected by `put` and ignored by `delete`,
//! so a rejected operation leaves the batch unchanged.
//!
//! There is no rollback. If the delete call fails after a successful upload,
//! the upload stays applied.

use std::sync::Arc;

use hashbrown::HashSet;
use tracing::{debug, warn};

use swiftkv_core::{ArchiveFormat, ArchiveWriter, ObjectStore, StoreError};

use crate::cache::CursorCache;
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::traits::Batch;

/// Buffered puts and deletes against one container.
pub struct SwiftBatch {
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CursorCache>,
    container: String,
    /// Created by the first accepted put
    archive: Option<ArchiveWriter>,
    deletes: Vec<String>,
    pending_deletes: HashSet<String>,
}

impl SwiftBatch {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, cache: Arc<dyn CursorCache>, container: String) -> Self {
        Self {
            store,
            cache,
            container,
            archive: None,
            deletes: Vec::new(),
            pending_deletes: HashSet::new(),
        }
    }

    /// Archive records buffered so far.
    pub fn puts(&self) -> usize {
        self.archive.as_ref().map_or(0, ArchiveWriter::records)
    }

    /// Distinct names queued for deletion.
    pub fn deletes(&self) -> usize {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_none() && self.deletes.is_empty()
    }
}

fn bulk_failure(operation: &'static str, errors: &[(String, String)]) -> StoreError {
    let detail = errors
        .iter()
        .map(|(name, reason)| format!("{}: {}", name, reason))
        .collect::<Vec<_>>()
        .join("; ");
    StoreError::BulkFailure { operation, failed: errors.len(), detail }
}

impl Batch for SwiftBatch {
    fn put(&mut self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
        if !key.is_storable() {
            return Err(DatastoreError::InvalidKey(key.clone()));
        }
        match self.archive.as_mut() {
            Some(archive) => archive.append(key.as_str(), value)?,
            None => {
                let mut archive = ArchiveWriter::new();
                archive.append(key.as_str(), value)?;
                self.archive = Some(archive);
            }
        }

        let name = key.name();
        if self.pending_deletes.remove(name) {
            self.deletes.retain(|n| n.as_str() != name);
        }
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> DatastoreResult<()> {
        if !key.is_storable() {
            return Ok(());
        }
        let name = key.name();
        if self.pending_deletes.insert(name.to_string()) {
            self.deletes.push(name.to_string());
        }
        Ok(())
    }

    fn commit(self) -> DatastoreResult<()> {
        // Listing positions are stale as soon as anything may change.
        self.cache.invalidate();

        debug!(
            container = %self.container,
            records = self.puts(),
            archive_bytes = self.archive.as_ref().map_or(0, ArchiveWriter::len),
            deletes = self.deletes.len(),
            "committing batch"
        );

        if let Some(archive) = self.archive {
            let body = archive.finish();
            let result = self.store.bulk_upload(&self.container, &body, ArchiveFormat::Tar)?;
            if !result.errors.is_empty() {
                warn!(
                    container = %self.container,
                    created = result.files_created,
                    failed = result.errors.len(),
                    "bulk upload reported failures"
                );
                return Err(bulk_failure("upload", &result.errors).into());
            }
        }

        if !self.deletes.is_empty() {
            let result = self.store.bulk_delete(&self.container, &self.deletes)?;
            if !result.errors.is_empty() {
                warn!(
                    container = %self.container,
                    deleted = result.deleted,
                    failed = result.errors.len(),
                    "bulk delete reported failures"
                );
                return Err(bulk_failure("delete", &result.errors).into());
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for SwiftBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwiftBatch")
            .field("container", &self.container)
            .field("puts", &self.puts())
            .field("deletes", &self.deletes.len())
            .finish()
    }
}
