//! # LRU Store
//!
//! Bounded in-memory store over [`lru::LruCache`]. Reads and writes refresh
//! a key; inserting past capacity evicts the least recently used one.

use crate::config::BridgeConfig;
use crate::errors::StoreError;
use crate::ports::outbound::ContractStore;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::debug;

/// Bounded store evicting the least recently used key.
pub struct LruStore {
    cache: Mutex<LruCache<Vec<u8>, Vec<u8>>>,
}

impl LruStore {
    /// Store holding at most `capacity` keys (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Store sized by `config.lru_capacity`.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.lru_capacity)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// True if no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of keys.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }

    /// Raises the capacity. Shrinking is rejected.
    pub fn enlarge_capacity(&self, capacity: usize) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        let current = cache.cap().get();
        match NonZeroUsize::new(capacity) {
            Some(cap) if capacity > current => {
                cache.resize(cap);
                Ok(())
            }
            _ => Err(StoreError::CapacityShrink {
                requested: capacity,
                current,
            }),
        }
    }
}

impl ContractStore for LruStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.cache.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let evicted = self.cache.lock().push(key.to_vec(), value.to_vec());
        if let Some((old, _)) = evicted.filter(|(old, _)| old.as_slice() != key) {
            debug!(key = %String::from_utf8_lossy(&old), "LRU evicted key");
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.cache.lock().pop(key);
        Ok(())
    }
}
