//! Process-wide cache of expensive model handles

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::error::Result;

/// Caches one loaded model per key.
///
/// `get_or_create` runs the factory at most once per key, even when several
/// callers ask for the same key at the same time. A failed factory leaves the
/// key empty so the next caller tries again.
pub struct ModelCache<K, V: ?Sized> {
    entries: RwLock<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> ModelCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: ?Sized,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, creating it with `factory` on a miss.
    pub async fn get_or_create<F, Fut>(&self, key: K, factory: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<V>>>,
    {
        // Fast path
        {
            let entries = self.entries.read().await;
            if let Some(value) = entries.get(&key).and_then(|cell| cell.get()) {
                return Ok(value.clone());
            }
        }

        let cell = {
            let mut entries = self.entries.write().await;
            entries.entry(key.clone()).or_default().clone()
        };

        let value = cell
            .get_or_try_init(|| {
                debug!("Cache miss for {:?}, creating", key);
                factory()
            })
            .await?;
        Ok(value.clone())
    }

    /// Get a value that is already loaded
    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of loaded values
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop the value for `key`; callers still holding it keep it alive.
    pub async fn evict(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.write().await;
        entries
            .remove(key)
            .and_then(|cell| cell.get().cloned())
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl<K, V> Default for ModelCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}
