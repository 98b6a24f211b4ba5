//! Session identity cache
//!
//! A bounded least-recently-used map from the (type, primary key) hash to
//! the cached instance. Inserting into a full cache evicts the least
//! recently used entry.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::model::AnyModel;

pub struct SessionCache {
    entries: LruCache<u64, Arc<AnyModel>>,
}

fn capacity(size: usize) -> OrmResult<NonZeroUsize> {
    NonZeroUsize::new(size)
        .ok_or_else(|| OrmError::invalid_argument("cache size must be at least 1"))
}

impl SessionCache {
    pub fn new(size: usize) -> OrmResult<Self> {
        Ok(Self {
            entries: LruCache::new(capacity(size)?),
        })
    }

    /// Insert or refresh an entry. Returns the hash of the entry evicted to
    /// make room, if any.
    pub fn put(&mut self, hash: u64, model: Arc<AnyModel>) -> Option<u64> {
        match self.entries.push(hash, model) {
            Some((evicted, _)) if evicted != hash => {
                debug!(evicted, "Session cache full; evicted least recently used entry");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, hash: u64) -> Option<Arc<AnyModel>> {
        self.entries.get(&hash).cloned()
    }

    /// Whether an entry exists, without touching its recency
    pub fn contains(&self, hash: u64) -> bool {
        self.entries.contains(&hash)
    }

    pub fn remove(&mut self, hash: u64) -> bool {
        self.entries.pop(&hash).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Change the capacity, evicting least recently used entries if the
    /// cache shrinks below its current size
    pub fn resize(&mut self, size: usize) -> OrmResult<()> {
        self.entries.resize(capacity(size)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: i32) -> Arc<AnyModel> {
        Arc::new(n)
    }

    #[test]
    fn test_full_cache_evicts_least_recently_used() {
        let mut cache = SessionCache::new(2).unwrap();
        assert_eq!(cache.put(1, entry(1)), None);
        assert_eq!(cache.put(2, entry(2)), None);

        // Touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(1).is_some());
        assert_eq!(cache.put(3, entry(3)), Some(2));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_refresh_does_not_evict() {
        let mut cache = SessionCache::new(1).unwrap();
        cache.put(1, entry(1));
        assert_eq!(cache.put(1, entry(10)), None);
        let value = cache.get(1).unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&10));
    }

    #[test]
    fn test_resize_and_zero_capacity() {
        let mut cache = SessionCache::new(3).unwrap();
        for n in 0..3 {
            cache.put(n, entry(n as i32));
        }
        cache.resize(1).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(2));
        assert!(cache.resize(0).is_err());
        assert!(SessionCache::new(0).is_err());
    }
}
