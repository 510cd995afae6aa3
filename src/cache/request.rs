//! Request-scoped memoization.
//!
//! Created by the unified parser at the start of every top-level parse and
//! discarded on return: no TTL, no eviction, no sharing between concurrent
//! calls. Recovered pattern results live here so they never pollute the
//! persistent tier.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::CacheValue;

/// Flat keyed store for one logical request.
///
/// Pattern evaluations for a single call may fan out across worker
/// threads, so the map carries its own lock; contention is negligible at
/// request scope.
#[derive(Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<String, Arc<dyn CacheValue>>>,
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn CacheValue>> {
        self.entries.lock().expect("request cache lock").get(key).cloned()
    }

    pub fn get_as<T: CacheValue>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.get(key)?;
        let any: Arc<dyn Any + Send + Sync> = value;
        any.downcast::<T>().ok()
    }

    pub fn set(&self, key: impl Into<String>, value: Arc<dyn CacheValue>) {
        self.entries
            .lock()
            .expect("request cache lock")
            .insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().expect("request cache lock").remove(key);
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().expect("request cache lock").contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("request cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().expect("request cache lock").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_has() {
        let cache = RequestCache::new();
        assert!(!cache.has("k"));

        cache.set("k", Arc::new("v".to_string()));
        assert!(cache.has("k"));
        assert_eq!(cache.get_as::<String>("k").unwrap().as_str(), "v");

        cache.delete("k");
        assert!(!cache.has("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn no_eviction_at_request_scope() {
        let cache = RequestCache::new();
        for i in 0..1000 {
            cache.set(format!("k{i}"), Arc::new(vec![0u8; 100]));
        }
        assert_eq!(cache.len(), 1000);
    }
}
