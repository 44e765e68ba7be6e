//! In-memory object store: a Swift account held in RAM.
//!
//! `InMemoryObjectStore` implements [`ObjectStore`] with the same listing and
//! bulk semantics as a Swift cluster, so the datastore can be exercised without
//! a network. It also counts calls per operation, logs listing requests and
//! supports one-shot fail points for failure-path tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::archive::{ArchiveFormat, ArchiveReader};
use crate::error::{StoreError, StoreResult};
use crate::object_store::{
    BulkDeleteResult, BulkUploadResult, ContainerInfo, ListOptions, ObjectInfo, ObjectStore,
    OCTET_STREAM,
};

/// Names returned by a listing call that does not set a limit
pub const DEFAULT_LISTING_LIMIT: usize = 10_000;

/// Operations of the [`ObjectStore`] trait, used for call counting and fail points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Authenticate,
    Container,
    GetObject,
    PutObject,
    DeleteObject,
    StatObject,
    ListObjects,
    BulkUpload,
    BulkDelete,
}

/// Per-operation call counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub authenticate: u64,
    pub container: u64,
    pub get: u64,
    pub put: u64,
    pub delete: u64,
    pub stat: u64,
    pub list: u64,
    pub bulk_upload: u64,
    pub bulk_delete: u64,
}

impl CallCounts {
    fn bump(&mut self, op: StoreOp) {
        let slot = match op {
            StoreOp::Authenticate => &mut self.authenticate,
            StoreOp::Container => &mut self.container,
            StoreOp::GetObject => &mut self.get,
            StoreOp::PutObject => &mut self.put,
            StoreOp::DeleteObject => &mut self.delete,
            StoreOp::StatObject => &mut self.stat,
            StoreOp::ListObjects => &mut self.list,
            StoreOp::BulkUpload => &mut self.bulk_upload,
            StoreOp::BulkDelete => &mut self.bulk_delete,
        };
        *slot += 1;
    }

    /// Calls that read or write object data (everything but auth and container lookups).
    pub fn data_calls(&self) -> u64 {
        self.get + self.put + self.delete + self.stat + self.list + self.bulk_upload + self.bulk_delete
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

type Container = BTreeMap<String, StoredObject>;

/// In-memory Swift account.
///
/// All methods take `&self`; containers sit behind a `RwLock` so listings and
/// reads run concurrently while writes are exclusive.
pub struct InMemoryObjectStore {
    /// Containers by name, objects ordered by name
    containers: RwLock<HashMap<String, Container>>,
    /// Calls made so far
    calls: Mutex<CallCounts>,
    /// Every listing request, in call order
    list_log: Mutex<Vec<ListOptions>>,
    /// One-shot injected failures
    fail_points: Mutex<HashMap<StoreOp, StoreError>>,
    /// Names every bulk call reports as a per-entry failure
    forbidden: Mutex<HashSet<String>>,
}

impl InMemoryObjectStore {
    /// Create an account with no containers.
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            calls: Mutex::new(CallCounts::default()),
            list_log: Mutex::new(Vec::new()),
            fail_points: Mutex::new(HashMap::new()),
            forbidden: Mutex::new(HashSet::new()),
        }
    }

    /// Create an account holding one empty container.
    pub fn with_container(name: &str) -> Self {
        let store = Self::new();
        store.create_container(name);
        store
    }

    /// Create a container if it does not exist yet.
    pub fn create_container(&self, name: &str) {
        let mut containers = self.containers.write();
        containers.entry(name.to_string()).or_default();
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.fail_points.lock().insert(op, err);
    }

    /// Make bulk uploads and deletes report `name` as a per-entry failure.
    pub fn forbid(&self, name: &str) {
        self.forbidden.lock().insert(name.to_string());
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    /// Listing requests made so far, in order.
    pub fn list_requests(&self) -> Vec<ListOptions> {
        self.list_log.lock().clone()
    }

    /// Zero the call counters and clear the listing log.
    pub fn reset_calls(&self) {
        *self.calls.lock() = CallCounts::default();
        self.list_log.lock().clear();
    }

    /// Number of objects in a container (0 if it does not exist).
    pub fn object_count(&self, container: &str) -> usize {
        let containers = self.containers.read();
        containers.get(container).map_or(0, |c| c.len())
    }

    /// All object names in a container, sorted.
    pub fn names(&self, container: &str) -> Vec<String> {
        let containers = self.containers.read();
        containers
            .get(container)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Count the call and fire a pending fail point for `op`.
    fn begin(&self, op: StoreOp) -> StoreResult<()> {
        self.calls.lock().bump(op);
        match self.fail_points.lock().remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read_container<T>(&self, container: &str, f: impl FnOnce(&Container) -> StoreResult<T>) -> StoreResult<T> {
        let containers = self.containers.read();
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        f(objects)
    }

    fn write_container<T>(&self, container: &str, f: impl FnOnce(&mut Container) -> StoreResult<T>) -> StoreResult<T> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        f(objects)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(container: &str, name: &str) -> StoreError {
    StoreError::ObjectNotFound {
        container: container.to_string(),
        name: name.to_string(),
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn authenticate(&self) -> StoreResult<()> {
        self.begin(StoreOp::Authenticate)
    }

    fn container(&self, container: &str) -> StoreResult<ContainerInfo> {
        self.begin(StoreOp::Container)?;
        self.read_container(container, |objects| {
            Ok(ContainerInfo {
                name: container.to_string(),
                bytes: objects.values().map(|o| o.data.len() as u64).sum(),
                object_count: objects.len() as u64,
            })
        })
    }

    fn get_object(&self, container: &str, name: &str) -> StoreResult<Vec<u8>> {
        self.begin(StoreOp::GetObject)?;
        self.read_container(container, |objects| {
            objects
                .get(name)
                .map(|o| o.data.clone())
                .ok_or_else(|| not_found(container, name))
        })
    }

    fn put_object(&self, container: &str, name: &str, data: &[u8], content_type: &str) -> StoreResult<()> {
        self.begin(StoreOp::PutObject)?;
        self.write_container(container, |objects| {
            objects.insert(
                name.to_string(),
                StoredObject {
                    data: data.to_vec(),
                    content_type: content_type.to_string(),
                },
            );
            Ok(())
        })
    }

    fn delete_object(&self, container: &str, name: &str) -> StoreResult<()> {
        self.begin(StoreOp::DeleteObject)?;
        self.write_container(container, |objects| {
            objects
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found(container, name))
        })
    }

    fn stat_object(&self, container: &str, name: &str) -> StoreResult<ObjectInfo> {
        self.begin(StoreOp::StatObject)?;
        self.read_container(container, |objects| {
            objects
                .get(name)
                .map(|o| ObjectInfo {
                    name: name.to_string(),
                    bytes: o.data.len() as u64,
                    content_type: o.content_type.clone(),
                })
                .ok_or_else(|| not_found(container, name))
        })
    }

    fn list_object_names(&self, container: &str, opts: &ListOptions) -> StoreResult<Vec<String>> {
        self.begin(StoreOp::ListObjects)?;
        self.list_log.lock().push(opts.clone());

        let limit = if opts.limit == 0 { DEFAULT_LISTING_LIMIT } else { opts.limit };
        let start = match &opts.marker {
            Some(marker) if *marker >= opts.prefix => Bound::Excluded(marker.clone()),
            _ => Bound::Included(opts.prefix.clone()),
        };

        self.read_container(container, |objects| {
            Ok(objects
                .range::<String, _>((start, Bound::Unbounded))
                .map(|(name, _)| name)
                .take_while(|name| name.starts_with(&opts.prefix))
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn bulk_upload(&self, container: &str, archive: &[u8], format: ArchiveFormat) -> StoreResult<BulkUploadResult> {
        self.begin(StoreOp::BulkUpload)?;
        debug!(container, format = format.as_param(), bytes = archive.len(), "bulk upload");

        // A malformed archive rejects the whole request before anything is created.
        let entries = ArchiveReader::new(archive).collect::<StoreResult<Vec<_>>>()?;
        let forbidden = self.forbidden.lock().clone();

        self.write_container(container, |objects| {
            let mut result = BulkUploadResult::default();
            for entry in entries {
                let name = entry.name.trim_start_matches('/');
                if name.is_empty() {
                    result.errors.push((entry.name.clone(), "400 Bad Request: empty object name".into()));
                    continue;
                }
                if forbidden.contains(name) {
                    result.errors.push((entry.name.clone(), "403 Forbidden".into()));
                    continue;
                }
                objects.insert(
                    name.to_string(),
                    StoredObject {
                        data: entry.data.to_vec(),
                        content_type: OCTET_STREAM.to_string(),
                    },
                );
                result.files_created += 1;
            }
            Ok(result)
        })
    }

    fn bulk_delete(&self, container: &str, names: &[String]) -> StoreResult<BulkDeleteResult> {
        self.begin(StoreOp::BulkDelete)?;
        debug!(container, count = names.len(), "bulk delete");
        let forbidden = self.forbidden.lock().clone();

        self.write_container(container, |objects| {
            let mut result = BulkDeleteResult::default();
            for name in names {
                if name.is_empty() {
                    result.errors.push((name.clone(), "400 Bad Request: empty object name".into()));
                } else if forbidden.contains(name.as_str()) {
                    result.errors.push((name.clone(), "403 Forbidden".into()));
                } else if objects.remove(name.as_str()).is_some() {
                    result.deleted += 1;
                } else {
                    result.not_found += 1;
                }
            }
            Ok(result)
        })
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let containers = self.containers.read();
        f.debug_struct("InMemoryObjectStore")
            .field("containers", &containers.len())
            .field("objects", &containers.values().map(|c| c.len()).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;

    const C: &str = "test";

    fn test_store() -> InMemoryObjectStore {
        InMemoryObjectStore::with_container(C)
    }

    fn put(store: &InMemoryObjectStore, name: &str, data: &[u8]) {
        store.put_object(C, name, data, OCTET_STREAM).unwrap();
    }

    fn list(store: &InMemoryObjectStore, prefix: &str, marker: Option<&str>, limit: usize) -> Vec<String> {
        let opts = ListOptions {
            prefix: prefix.to_string(),
            marker: marker.map(str::to_string),
            limit,
        };
        store.list_object_names(C, &opts).unwrap()
    }

    #[test]
    fn test_put_get_stat() {
        let store = test_store();
        put(&store, "a/b", b"hello");
        assert_eq!(store.get_object(C, "a/b").unwrap(), b"hello");

        let info = store.stat_object(C, "a/b").unwrap();
        assert_eq!(info.bytes, 5);
        assert_eq!(info.content_type, OCTET_STREAM);
    }

    #[test]
    fn test_missing_object() {
        let store = test_store();
        assert!(store.get_object(C, "nope").unwrap_err().is_not_found());
        assert!(store.stat_object(C, "nope").unwrap_err().is_not_found());
        assert!(store.delete_object(C, "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_container() {
        let store = test_store();
        assert_eq!(
            store.container("other").unwrap_err(),
            StoreError::ContainerNotFound("other".into())
        );
        assert!(matches!(
            store.put_object("other", "k", b"v", OCTET_STREAM),
            Err(StoreError::ContainerNotFound(_))
        ));
    }

    #[test]
    fn test_container_stats() {
        let store = test_store();
        put(&store, "x", b"12345");
        put(&store, "y", b"123456789");
        let info = store.container(C).unwrap();
        assert_eq!(info.bytes, 14);
        assert_eq!(info.object_count, 2);
    }

    #[test]
    fn test_list_prefix_marker_limit() {
        let store = test_store();
        for name in ["a", "a/b", "a/b/c", "a/c", "b", "b/a"] {
            put(&store, name, b"");
        }

        assert_eq!(list(&store, "a/", None, 0), vec!["a/b", "a/b/c", "a/c"]);
        assert_eq!(list(&store, "a/", None, 2), vec!["a/b", "a/b/c"]);
        assert_eq!(list(&store, "a/", Some("a/b/c"), 10), vec!["a/c"]);
        assert_eq!(list(&store, "a/", Some("a/c"), 10), Vec::<String>::new());
        // Marker before the prefix starts at the prefix.
        assert_eq!(list(&store, "b", Some("a"), 10), vec!["b", "b/a"]);
        assert_eq!(list(&store, "", Some("a/c"), 10), vec!["b", "b/a"]);
        assert_eq!(list(&store, "zzz", None, 10), Vec::<String>::new());
    }

    #[test]
    fn test_list_is_logged() {
        let store = test_store();
        list(&store, "p", Some("m"), 7);
        let log = store.list_requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].limit, 7);
        assert_eq!(log[0].marker.as_deref(), Some("m"));
        assert_eq!(store.calls().list, 1);

        store.reset_calls();
        assert!(store.list_requests().is_empty());
        assert_eq!(store.calls(), CallCounts::default());
    }

    #[test]
    fn test_bulk_upload_strips_leading_slash() {
        let store = test_store();
        let mut writer = ArchiveWriter::new();
        writer.append("/a", b"1").unwrap();
        writer.append("/a/b", b"2").unwrap();
        writer.append("/a", b"3").unwrap();
        let archive = writer.finish();

        let result = store.bulk_upload(C, &archive, ArchiveFormat::Tar).unwrap();
        assert_eq!(result.files_created, 3);
        assert!(result.errors.is_empty());
        assert_eq!(store.names(C), vec!["a", "a/b"]);
        // Later records replace earlier ones.
        assert_eq!(store.get_object(C, "a").unwrap(), b"3");
    }

    #[test]
    fn test_bulk_upload_rejects_corrupt_archive() {
        let store = test_store();
        let mut writer = ArchiveWriter::new();
        writer.append("/a", b"1").unwrap();
        let mut archive = writer.finish();
        archive[10] = b'!';

        assert!(matches!(
            store.bulk_upload(C, &archive, ArchiveFormat::Tar),
            Err(StoreError::Archive { .. })
        ));
        assert_eq!(store.object_count(C), 0);
    }

    #[test]
    fn test_bulk_delete() {
        let store = test_store();
        put(&store, "a", b"");
        put(&store, "b", b"");

        let names = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        let result = store.bulk_delete(C, &names).unwrap();
        assert_eq!(result.deleted, 2);
        assert_eq!(result.not_found, 1);
        assert!(result.errors.is_empty());
        assert_eq!(store.object_count(C), 0);
    }

    #[test]
    fn test_forbidden_names_fail_per_entry() {
        let store = test_store();
        put(&store, "locked", b"v");
        store.forbid("locked");

        let result = store.bulk_delete(C, &["locked".to_string()]).unwrap();
        assert_eq!(result.deleted, 0);
        assert_eq!(result.errors, vec![("locked".to_string(), "403 Forbidden".to_string())]);
        assert_eq!(store.object_count(C), 1);
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let store = test_store();
        put(&store, "k", b"v");
        store.fail_next(StoreOp::GetObject, StoreError::Transport("connection reset".into()));

        assert_eq!(
            store.get_object(C, "k").unwrap_err(),
            StoreError::Transport("connection reset".into())
        );
        assert_eq!(store.get_object(C, "k").unwrap(), b"v");
        assert_eq!(store.calls().get, 2);
    }

    #[test]
    fn test_call_counts() {
        let store = test_store();
        store.authenticate().unwrap();
        put(&store, "k", b"v");
        store.get_object(C, "k").unwrap();
        store.stat_object(C, "k").unwrap();
        store.delete_object(C, "k").unwrap();

        let calls = store.calls();
        assert_eq!(calls.authenticate, 1);
        assert_eq!(calls.put, 1);
        assert_eq!(calls.get, 1);
        assert_eq!(calls.stat, 1);
        assert_eq!(calls.delete, 1);
        assert_eq!(calls.data_calls(), 4);
    }

    #[test]
    fn test_concurrent_reads() {
        use std::sync::Arc;

        let store = Arc::new(test_store());
        for i in 0..100 {
            put(&store, &format!("k{:03}", i), format!("v{}", i).as_bytes());
        }

        let mut handles = vec![];
        for _ in 0..8 {
            let s = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let val = s.get_object(C, &format!("k{:03}", i)).unwrap();
                    assert_eq!(val, format!("v{}", i).as_bytes());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_debug_format() {
        let store = test_store();
        put(&store, "x", b"1");
        let debug = format!("{:?}", store);
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("objects: 1"));
    }
}
