//! Cursor cache: remembered listing positions for sequential paging.
//!
//! Listing is forward-only and marker based, so `offset = n` would otherwise
//! cost a scan of `n` names. After a query finishes, the datastore records the
//! last emitted name and its absolute position (`offset + emitted`). A later
//! query on the same prefix whose offset is at or past that position resumes
//! from the name as marker and only skips the difference.
//!
//! The default [`SingleSlotCache`] holds one position per store. Queries over
//! different prefixes evict each other's position; sequential paging over one
//! prefix is the case it serves.

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::debug;

/// A remembered listing position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPosition {
    /// Normalized listing prefix (no leading '/')
    pub prefix: String,
    /// Storage name of the last entry the query emitted
    pub name: String,
    /// Absolute index just past that entry
    pub index: usize,
}

/// Storage for listing positions, shared by all queries on a store.
///
/// `lookup` and `generation` are called under shared access; `record_since`
/// and `invalidate` are exclusive. Every `invalidate` bumps the generation, so
/// a query that captured the generation before a mutation cannot write its
/// position back afterwards.
pub trait CursorCache: Send + Sync {
    /// Position remembered for `prefix`, if any.
    fn lookup(&self, prefix: &str) -> Option<CachedPosition>;

    /// Counter bumped by every `invalidate`.
    fn generation(&self) -> u64;

    /// Remember a position unless the cache was invalidated after
    /// `generation` was read. Returns whether the position was stored.
    fn record_since(&self, position: CachedPosition, generation: u64) -> bool;

    /// Forget every position. Called whenever the key set may have changed.
    fn invalidate(&self);

    /// Remember a position at the current generation.
    fn record(&self, position: CachedPosition) {
        self.record_since(position, self.generation());
    }
}

#[derive(Debug, Default)]
struct Slot {
    position: Option<CachedPosition>,
    generation: u64,
}

/// One position per store, behind a read/write lock.
#[derive(Debug, Default)]
pub struct SingleSlotCache {
    slot: RwLock<Slot>,
}

impl SingleSlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slot contents regardless of prefix.
    pub fn position(&self) -> Option<CachedPosition> {
        self.slot.read().position.clone()
    }
}

impl CursorCache for SingleSlotCache {
    fn lookup(&self, prefix: &str) -> Option<CachedPosition> {
        let slot = self.slot.read();
        slot.position.as_ref().filter(|p| p.prefix == prefix).cloned()
    }

    fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    fn record_since(&self, position: CachedPosition, generation: u64) -> bool {
        let mut slot = self.slot.write();
        if slot.generation != generation {
            debug!(prefix = %position.prefix, name = %position.name, "stale cursor discarded");
            return false;
        }
        debug!(prefix = %position.prefix, name = %position.name, index = position.index, "cursor recorded");
        slot.position = Some(position);
        true
    }

    fn invalidate(&self) {
        let mut slot = self.slot.write();
        slot.generation = slot.generation.wrapping_add(1);
        if slot.position.take().is_some() {
            debug!("cursor invalidated");
        }
    }
}

/// Never remembers anything; every query scans from the start.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CursorCache for NoopCache {
    fn lookup(&self, _prefix: &str) -> Option<CachedPosition> {
        None
    }

    fn generation(&self) -> u64 {
        0
    }

    fn record_since(&self, _position: CachedPosition, _generation: u64) -> bool {
        false
    }

    fn invalidate(&self) {}
}

#[derive(Debug, Default)]
struct PrefixSlots {
    positions: HashMap<String, CachedPosition>,
    generation: u64,
}

/// One position per prefix, so interleaved scans over different prefixes
/// keep their own cursors.
#[derive(Debug, Default)]
pub struct PrefixMapCache {
    slots: RwLock<PrefixSlots>,
}

impl PrefixMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.read().positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().positions.is_empty()
    }
}

impl CursorCache for PrefixMapCache {
    fn lookup(&self, prefix: &str) -> Option<CachedPosition> {
        self.slots.read().positions.get(prefix).cloned()
    }

    fn generation(&self) -> u64 {
        self.slots.read().generation
    }

    fn record_since(&self, position: CachedPosition, generation: u64) -> bool {
        let mut slots = self.slots.write();
        if slots.generation != generation {
            return false;
        }
        slots.positions.insert(position.prefix.clone(), position);
        true
    }

    fn invalidate(&self) {
        let mut slots = self.slots.write();
        slots.generation = slots.generation.wrapping_add(1);
        slots.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pos(prefix: &str, name: &str, index: usize) -> CachedPosition {
        CachedPosition { prefix: prefix.into(), name: name.into(), index }
    }

    #[test]
    fn test_single_slot_lookup_matches_prefix() {
        let cache = SingleSlotCache::new();
        assert_eq!(cache.lookup("a/"), None);

        cache.record(pos("a/", "a/c", 4));
        assert_eq!(cache.lookup("a/"), Some(pos("a/", "a/c", 4)));
        assert_eq!(cache.lookup("b/"), None);
        assert_eq!(cache.lookup(""), None);
    }

    #[test]
    fn test_single_slot_is_replaced() {
        let cache = SingleSlotCache::new();
        cache.record(pos("a/", "a/c", 4));
        cache.record(pos("b/", "b/x", 1));
        assert_eq!(cache.lookup("a/"), None);
        assert_eq!(cache.position(), Some(pos("b/", "b/x", 1)));
    }

    #[test]
    fn test_single_slot_invalidate() {
        let cache = SingleSlotCache::new();
        cache.record(pos("a/", "a/c", 4));
        cache.invalidate();
        assert_eq!(cache.lookup("a/"), None);
        assert_eq!(cache.position(), None);
        // Invalidating an empty slot is fine.
        cache.invalidate();
    }

    #[test]
    fn test_record_after_invalidate_is_discarded() {
        let cache = SingleSlotCache::new();
        let before = cache.generation();
        cache.invalidate();
        assert_ne!(cache.generation(), before);

        assert!(!cache.record_since(pos("a/", "a/c", 4), before));
        assert_eq!(cache.position(), None);

        assert!(cache.record_since(pos("a/", "a/c", 4), cache.generation()));
        assert_eq!(cache.lookup("a/"), Some(pos("a/", "a/c", 4)));
    }

    #[test]
    fn test_prefix_map_discards_stale_record() {
        let cache = PrefixMapCache::new();
        let before = cache.generation();
        cache.invalidate();
        assert!(!cache.record_since(pos("a/", "a/c", 4), before));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_noop_cache() {
        let cache = NoopCache;
        cache.record(pos("a/", "a/c", 4));
        assert_eq!(cache.lookup("a/"), None);
    }

    #[test]
    fn test_prefix_map_keeps_each_prefix() {
        let cache = PrefixMapCache::new();
        cache.record(pos("a/", "a/c", 4));
        cache.record(pos("b/", "b/x", 1));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("a/"), Some(pos("a/", "a/c", 4)));
        assert_eq!(cache.lookup("b/"), Some(pos("b/", "b/x", 1)));

        cache.record(pos("a/", "a/d", 5));
        assert_eq!(cache.lookup("a/").unwrap().index, 5);

        cache.invalidate();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_record_and_lookup() {
        let cache = Arc::new(SingleSlotCache::new());
        let mut handles = vec![];
        for t in 0..8 {
            let c = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                let prefix = format!("p{}/", t);
                for i in 0..200 {
                    c.record(pos(&prefix, &format!("{}{}", prefix, i), i + 1));
                    if let Some(p) = c.lookup(&prefix) {
                        // Whatever we read back is internally consistent.
                        assert_eq!(p.prefix, prefix);
                        assert!(p.name.starts_with(&prefix));
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.position().is_some());
    }
}
