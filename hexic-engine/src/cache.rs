//! The process-wide subtree result cache.
//!
//! Results are keyed by the operation's canonical textual form. A lookup
//! either returns an existing entry (possibly still in progress; the
//! caller blocks on the [`ResultTable`]'s own state machine, not on the
//! cache lock) or atomically reserves a fresh in-progress entry for the
//! caller to fill. This keeps the cache lock out of `compute_result`:
//! concurrent queries with identical subtrees wait on the same table
//! instead of computing twice.
//!
//! Entries reserved by the root of a query are pinned: they live outside
//! the LRU and are never evicted.

use hexic_table::ResultTable;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`SubtreeCache::lookup_or_reserve`].
pub enum CacheLookup {
    /// An entry already existed; await it and read.
    Hit(Arc<ResultTable>),
    /// A fresh in-progress entry was inserted; the caller must publish or
    /// abort it.
    Reserved(Arc<ResultTable>),
}

struct CacheInner {
    lru: LruCache<String, Arc<ResultTable>>,
    pinned: FxHashMap<String, Arc<ResultTable>>,
}

/// LRU-bounded cache of subtree results, plus pinned entries.
pub struct SubtreeCache {
    inner: Mutex<CacheInner>,
}

impl SubtreeCache {
    /// Cache with room for `capacity` unpinned entries.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).expect("cache capacity must be > 0");
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(cap),
                pinned: FxHashMap::default(),
            }),
        }
    }

    /// Find the entry for `key`, or reserve a fresh in-progress one. With
    /// `pin`, the entry (hit or reserved) is moved out of the LRU and kept
    /// permanently.
    pub fn lookup_or_reserve(&self, key: &str, pin: bool) -> CacheLookup {
        let mut inner = self.inner.lock();
        if let Some(table) = inner.pinned.get(key) {
            return CacheLookup::Hit(Arc::clone(table));
        }
        if let Some(table) = inner.lru.get(key).map(Arc::clone) {
            if pin {
                inner.lru.pop(key);
                inner.pinned.insert(key.to_string(), Arc::clone(&table));
            }
            return CacheLookup::Hit(table);
        }
        let table = Arc::new(ResultTable::new());
        if pin {
            inner.pinned.insert(key.to_string(), Arc::clone(&table));
        } else {
            inner.lru.put(key.to_string(), Arc::clone(&table));
        }
        debug!(key, pin, "reserved cache entry");
        CacheLookup::Reserved(table)
    }

    /// Drop the entry for `key` (after a failed computation, so a retry
    /// can compute afresh).
    pub fn evict(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.lru.pop(key);
        inner.pinned.remove(key);
    }

    /// Look up without reserving.
    pub fn peek(&self, key: &str) -> Option<Arc<ResultTable>> {
        let inner = self.inner.lock();
        inner
            .pinned
            .get(key)
            .or_else(|| inner.lru.peek(key))
            .map(Arc::clone)
    }

    /// Number of entries, pinned included.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.lru.len() + inner.pinned.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.pinned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexic_table::{IdTable, ResultData};

    fn publish_empty(table: &ResultTable) {
        table.publish(ResultData::new(IdTable::new(1), vec![], vec![]));
    }

    #[test]
    fn test_reserve_then_hit_same_table() {
        let cache = SubtreeCache::new(4);
        let reserved = match cache.lookup_or_reserve("SCAN X", false) {
            CacheLookup::Reserved(t) => t,
            CacheLookup::Hit(_) => panic!("first lookup must reserve"),
        };
        publish_empty(&reserved);

        match cache.lookup_or_reserve("SCAN X", false) {
            CacheLookup::Hit(t) => assert!(Arc::ptr_eq(&t, &reserved)),
            CacheLookup::Reserved(_) => panic!("second lookup must hit"),
        }
    }

    #[test]
    fn test_eviction_order_spares_pinned() {
        let cache = SubtreeCache::new(2);
        let pinned = match cache.lookup_or_reserve("root", true) {
            CacheLookup::Reserved(t) => t,
            _ => unreachable!(),
        };
        for key in ["a", "b", "c"] {
            if let CacheLookup::Reserved(t) = cache.lookup_or_reserve(key, false) {
                publish_empty(&t);
            }
        }
        // "a" fell out of the two-entry LRU; the pinned root survived.
        assert!(cache.peek("a").is_none());
        assert!(cache.peek("b").is_some());
        assert!(cache.peek("c").is_some());
        assert!(Arc::ptr_eq(&cache.peek("root").unwrap(), &pinned));
    }

    #[test]
    fn test_evict_allows_retry() {
        let cache = SubtreeCache::new(2);
        let first = match cache.lookup_or_reserve("k", false) {
            CacheLookup::Reserved(t) => t,
            _ => unreachable!(),
        };
        first.abort();
        cache.evict("k");
        match cache.lookup_or_reserve("k", false) {
            CacheLookup::Reserved(t) => assert!(!Arc::ptr_eq(&t, &first)),
            CacheLookup::Hit(_) => panic!("evicted entry must not hit"),
        }
    }
}
