//! Cursor-caching query engine.
//!
//! A [`QueryResults`] turns one offset/limit prefix query into forward,
//! marker-based listing calls. It is an explicit state machine:
//!
//! - `names`: listing page buffer, drained front to back
//! - `skip`: residual offset still to discard locally
//! - `opts.marker`: last name seen, where the next listing call resumes
//! - `exhausted`: the store returned a short page, no more calls
//! - `finished`: terminal; every later `advance` returns `None`
//!
//! Skipped names are dropped without fetching their values. When the query
//! ends by reaching its limit or exhausting the listing, the last emitted name
//! and its absolute index are recorded in the cursor cache, unless the cache
//! was invalidated after the query started. Closing early records nothing.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use swiftkv_core::{CancellationToken, ListOptions, ObjectStore};

use crate::cache::{CachedPosition, CursorCache};
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::{normalize_prefix, Key};
use crate::query::{Entry, Query};

/// Lazy, finite, non-restartable sequence of query results.
pub struct QueryResults {
    query: Query,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CursorCache>,
    container: String,
    cancel: CancellationToken,
    /// Cache generation seen at start
    generation: u64,
    /// Prefix, marker and page size of the next listing call
    opts: ListOptions,
    skip: usize,
    names: VecDeque<String>,
    exhausted: bool,
    emitted: usize,
    last_name: Option<String>,
    finished: bool,
}

impl QueryResults {
    /// Validate `query` and position the scan, consulting the cursor cache.
    ///
    /// Unsupported queries fail here, before any call to the store.
    pub fn start(
        query: Query,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CursorCache>,
        container: String,
        page_size: usize,
        cancel: CancellationToken,
    ) -> DatastoreResult<Self> {
        query.check_supported()?;

        let prefix = normalize_prefix(&query.prefix).to_string();
        let generation = cache.generation();
        let (marker, skip) = match cache.lookup(&prefix) {
            Some(pos) if pos.index <= query.offset => (Some(pos.name), query.offset - pos.index),
            _ => (None, query.offset),
        };

        let mut page = page_size.max(1);
        if query.limit > 0 {
            page = page.min(skip.saturating_add(query.limit));
        }

        debug!(
            prefix = %prefix,
            offset = query.offset,
            limit = query.limit,
            resumed = marker.is_some(),
            skip,
            "query started"
        );

        Ok(Self {
            query,
            store,
            cache,
            container,
            cancel,
            generation,
            opts: ListOptions { prefix, marker, limit: page },
            skip,
            names: VecDeque::new(),
            exhausted: false,
            emitted: 0,
            last_name: None,
            finished: false,
        })
    }

    /// The query being answered.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Entries emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Produce the next entry, `None` once the sequence has ended.
    ///
    /// An error is yielded once and ends the sequence.
    pub fn advance(&mut self) -> Option<DatastoreResult<Entry>> {
        if self.finished {
            return None;
        }
        if self.limit_reached() {
            self.finish();
            return None;
        }

        let name = match self.next_name() {
            Ok(Some(name)) => name,
            Ok(None) => {
                self.remember_position();
                self.finish();
                return None;
            }
            Err(e) => {
                self.finish();
                return Some(Err(e));
            }
        };

        self.emitted += 1;

        let key = Key::from_name(&name);
        let value = if self.query.keys_only {
            None
        } else {
            match self.store.get_object(&self.container, &name) {
                Ok(value) => Some(value),
                Err(e) => {
                    self.finish();
                    return Some(Err(e.into()));
                }
            }
        };
        self.last_name = Some(name);

        if self.limit_reached() || (self.exhausted && self.names.is_empty()) {
            self.remember_position();
            self.finish();
        }

        Some(Ok(Entry { key, value }))
    }

    /// Abandon the scan: drop buffered names, leave the cache alone.
    pub fn close(&mut self) {
        self.finish();
    }

    /// Drain the remaining entries, stopping at the first error.
    pub fn rest(self) -> DatastoreResult<Vec<Entry>> {
        self.collect()
    }

    fn limit_reached(&self) -> bool {
        self.query.limit > 0 && self.emitted >= self.query.limit
    }

    fn finish(&mut self) {
        self.finished = true;
        self.names = VecDeque::new();
    }

    fn remember_position(&self) {
        if let Some(name) = &self.last_name {
            let position = CachedPosition {
                prefix: self.opts.prefix.clone(),
                name: name.clone(),
                index: self.query.offset + self.emitted,
            };
            self.cache.record_since(position, self.generation);
        }
    }

    /// Never ask for more names than the residual skip plus what the limit
    /// still allows.
    fn cap_page(&mut self) {
        if self.query.limit == 0 {
            return;
        }
        let remaining = self.query.limit.saturating_sub(self.emitted);
        let wanted = self.skip.saturating_add(remaining);
        if wanted > 0 && wanted < self.opts.limit {
            self.opts.limit = wanted;
        }
    }

    fn next_name(&mut self) -> DatastoreResult<Option<String>> {
        while self.names.is_empty() || self.skip > 0 {
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page()?;
        }
        Ok(self.names.pop_front())
    }

    fn fetch_page(&mut self) -> DatastoreResult<()> {
        if self.cancel.is_cancelled() {
            warn!(prefix = %self.opts.prefix, emitted = self.emitted, "query cancelled");
            return Err(DatastoreError::Cancelled);
        }

        self.cap_page();
        let page = self.store.list_object_names(&self.container, &self.opts)?;
        debug!(
            prefix = %self.opts.prefix,
            marker = ?self.opts.marker,
            requested = self.opts.limit,
            returned = page.len(),
            "listing page"
        );

        if page.len() < self.opts.limit {
            self.exhausted = true;
        }
        let Some(last) = page.last() else {
            self.exhausted = true;
            return Ok(());
        };
        self.opts.marker = Some(last.clone());

        if self.skip >= page.len() {
            self.skip -= page.len();
            return Ok(());
        }
        let skip = std::mem::take(&mut self.skip);
        self.names.extend(page.into_iter().skip(skip));
        Ok(())
    }
}

impl Iterator for QueryResults {
    type Item = DatastoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

impl std::fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("prefix", &self.opts.prefix)
            .field("marker", &self.opts.marker)
            .field("skip", &self.skip)
            .field("buffered", &self.names.len())
            .field("emitted", &self.emitted)
            .field("exhausted", &self.exhausted)
            .field("finished", &self.finished)
            .finish()
    }
}
