//! Memoize-on-miss key/value table

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Permanent memoization table for small, bounded key spaces.
///
/// There is no eviction and no TTL; entries live as long as the cache.
#[derive(Debug)]
pub struct Cache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the value for `key`, generating and storing it on a miss.
    ///
    /// The generator runs without the lock held, so it may use the cache itself.
    pub fn get(&self, key: K, generate: impl FnOnce() -> V) -> V {
        if let Some(value) = self.peek(&key) {
            return value;
        }
        let value = generate();
        self.lock().entry(key).or_insert(value).clone()
    }

    /// Get the value for `key` without generating one
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Overwrite the value for `key`
    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
        // A poisoned table still holds valid entries.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
