//! Admission/eviction policies driven by a frequency sketch.

pub mod fifo;
pub mod tinylfu;

pub use fifo::FifoPolicy;
pub use tinylfu::{Segment, WTinyLfuPolicy};

use std::hash::Hash;

use ahash::AHashSet;

/// Storage backend a policy drives.
///
/// The policy decides *what* lives in the cache; the store holds the
/// entries themselves.  [`MockCache`] is enough for hit-rate studies
/// where values are irrelevant.
pub trait CacheStore<K, V> {
    fn contains(&self, key: &K) -> bool;
    fn put(&mut self, key: K, value: V);
    fn remove(&mut self, key: &K);
    fn is_full(&self) -> bool;
}

/// Replacement policy, consulted once per access.
///
/// The driver calls the two hooks serially: `on_hit` when the store
/// already holds the key, `on_miss` otherwise.  A policy keeps its own
/// bookkeeping and tells the store what to evict.
pub trait ReplacementPolicy<K, V> {
    /// The key was found in the cache.
    fn on_hit(&mut self, key: &K);

    /// The key was absent; admit it, evicting as needed, and store the
    /// value.
    fn on_miss(&mut self, cache: &mut dyn CacheStore<K, V>, key: K, value: V);
}

/// Key-set store for simulations: remembers which keys are cached,
/// discards values.
pub struct MockCache<K> {
    max_size: usize,
    keys: AHashSet<K>,
}

impl<K: Hash + Eq> MockCache<K> {
    pub fn new(max_size: usize) -> Self {
        MockCache {
            max_size,
            keys: AHashSet::with_capacity(max_size),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Hash + Eq, V> CacheStore<K, V> for MockCache<K> {
    fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    fn put(&mut self, key: K, _value: V) {
        #[cfg(debug_assertions)]
        if self.keys.len() >= self.max_size && !self.keys.contains(&key) {
            log::warn!(
                "MockCache: insertion into a full cache ({} >= {})",
                self.keys.len(),
                self.max_size
            );
        }
        self.keys.insert(key);
    }

    fn remove(&mut self, key: &K) {
        if !self.keys.remove(key) {
            #[cfg(debug_assertions)]
            log::warn!("MockCache: removal of a key that is not cached");
        }
    }

    fn is_full(&self) -> bool {
        self.keys.len() >= self.max_size
    }
}
