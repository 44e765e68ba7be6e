//! Object-storage capability consumed by the datastore.
//!
//! This is the whole surface SwiftKV needs from a Swift-style client:
//! per-object CRUD, marker-based listing and the two bulk endpoints.
//! Authentication, retries and HTTP plumbing live behind it.

use crate::archive::ArchiveFormat;
use crate::error::StoreResult;

/// Content type used for every object written by the datastore
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Listing parameters for [`ObjectStore::list_object_names`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only names starting with this prefix
    pub prefix: String,
    /// Only names strictly greater than this one
    pub marker: Option<String>,
    /// Maximum names to return; 0 means the server default
    pub limit: usize,
}

/// Metadata returned by [`ObjectStore::stat_object`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    /// Object size in bytes as reported by the server
    pub bytes: u64,
    pub content_type: String,
}

/// Metadata returned by [`ObjectStore::container`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    /// Sum of all object sizes in the container
    pub bytes: u64,
    pub object_count: u64,
}

/// Outcome of a bulk upload call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUploadResult {
    pub files_created: usize,
    /// `(name, reason)` for each record the server rejected
    pub errors: Vec<(String, String)>,
}

/// Outcome of a bulk delete call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteResult {
    pub deleted: usize,
    pub not_found: usize,
    /// `(name, reason)` for each name the server failed to delete
    pub errors: Vec<(String, String)>,
}

/// Swift-style object-storage client.
///
/// Implementations must satisfy:
/// - `list_object_names` returns names in ascending byte order, strictly after
///   the marker, and returns fewer than `limit` names only when the listing
///   is exhausted.
/// - Missing objects are reported as `StoreError::ObjectNotFound`.
/// - Bulk uploads strip one leading '/' from record names.
/// - All errors are returned verbatim; retries belong to the client.
pub trait ObjectStore: Send + Sync {
    /// Establish a session. Calling it again is harmless.
    fn authenticate(&self) -> StoreResult<()>;

    /// Resolve a container and return its usage statistics.
    fn container(&self, container: &str) -> StoreResult<ContainerInfo>;

    /// Read an object's full body.
    fn get_object(&self, container: &str, name: &str) -> StoreResult<Vec<u8>>;

    /// Create or replace an object.
    fn put_object(&self, container: &str, name: &str, data: &[u8], content_type: &str) -> StoreResult<()>;

    /// Remove an object.
    fn delete_object(&self, container: &str, name: &str) -> StoreResult<()>;

    /// Read an object's metadata without its body.
    fn stat_object(&self, container: &str, name: &str) -> StoreResult<ObjectInfo>;

    /// List object names in ascending order.
    fn list_object_names(&self, container: &str, opts: &ListOptions) -> StoreResult<Vec<String>>;

    /// Extract an archive into the container, one object per record.
    fn bulk_upload(&self, container: &str, archive: &[u8], format: ArchiveFormat) -> StoreResult<BulkUploadResult>;

    /// Delete many objects in one call.
    fn bulk_delete(&self, container: &str, names: &[String]) -> StoreResult<BulkDeleteResult>;
}
