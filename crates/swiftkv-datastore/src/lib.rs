//! SwiftKV datastore
//!
//! Implements a generic key-value contract ([`Datastore`], [`Batching`],
//! [`PersistentDatastore`]) over one container of a Swift-style object store.
//!
//! # Architecture
//!
//! The object store offers per-object CRUD, forward-only marker listing and
//! two bulk endpoints. The bridge works as follows:
//! - Each key `/a/b` is stored as object `a/b` (the leading '/' is dropped)
//! - Queries are prefix listings, paged with markers; offset is applied by
//!   skipping names locally, and a cursor cache remembers where the last
//!   query ended so sequential pages do not rescan from the start
//! - Batches buffer puts in a tar archive and deletes in a name list, then
//!   commit with one bulk upload and one bulk delete
//! - Every mutation invalidates the cursor cache

pub mod batch;
pub mod cache;
pub mod cursor;
pub mod datastore;
pub mod error;
pub mod key;
pub mod plugin;
pub mod query;
pub mod traits;

pub use batch::SwiftBatch;
pub use cache::{CachedPosition, CursorCache, NoopCache, PrefixMapCache, SingleSlotCache};
pub use cursor::QueryResults;
pub use datastore::SwiftDatastore;
pub use error::{DatastoreError, DatastoreResult};
pub use key::{key_to_name, name_to_key, Key};
pub use plugin::{PluginConfig, SwiftPlugin};
pub use query::{CompareOp, Entry, Filter, Order, Query};
pub use traits::{Batch, Batching, Datastore, PersistentDatastore};
