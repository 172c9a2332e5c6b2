//! Versioned cache storage

use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::CachedResponse;
use crate::Result;

/// Durable, versioned key-value store of cached responses
///
/// Entries live inside a named generation. Looking up a key only ever
/// searches the given generation.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Create the generation if it does not exist
    async fn open(&self, generation: &str) -> Result<()>;

    /// Store one entry, replacing any previous entry for `key`
    async fn put(&self, generation: &str, key: &str, response: &CachedResponse) -> Result<()>;

    /// Store several entries
    async fn put_all(&self, generation: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
        for (key, response) in entries {
            self.put(generation, key, response).await?;
        }
        Ok(())
    }

    /// Find the entry for `key`
    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<CachedResponse>>;

    /// Keys stored in a generation, sorted
    async fn keys(&self, generation: &str) -> Result<Vec<String>>;

    /// Names of all existing generations, sorted
    async fn generations(&self) -> Result<Vec<String>>;

    /// Remove a generation and its entries. Returns whether it existed.
    async fn delete_generation(&self, generation: &str) -> Result<bool>;
}

/// In-memory store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    generations: RwLock<BTreeMap<String, BTreeMap<String, CachedResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, generation: &str) -> Result<()> {
        self.generations.write().await.entry(generation.to_string()).or_default();
        Ok(())
    }

    async fn put(&self, generation: &str, key: &str, response: &CachedResponse) -> Result<()> {
        let mut generations = self.generations.write().await;
        generations
            .entry(generation.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        debug!(generation, key, "Stored cache entry");
        Ok(())
    }

    async fn put_all(&self, generation: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
        // Single lock so readers never observe a partial install
        let mut generations = self.generations.write().await;
        let bucket = generations.entry(generation.to_string()).or_default();
        for (key, response) in entries {
            bucket.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<CachedResponse>> {
        let generations = self.generations.read().await;
        Ok(generations.get(generation).and_then(|bucket| bucket.get(key)).cloned())
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>> {
        let generations = self.generations.read().await;
        Ok(generations.get(generation).map(|b| b.keys().cloned().collect()).unwrap_or_default())
    }

    async fn generations(&self) -> Result<Vec<String>> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generations_are_isolated() {
        let store = MemoryCacheStore::new();
        let response = CachedResponse::new(200, "text/html", "<html></html>");

        store.put("v1", "http://app.test/", &response).await.unwrap();
        store.open("v2").await.unwrap();

        assert_eq!(store.lookup("v1", "http://app.test/").await.unwrap(), Some(response));
        assert_eq!(store.lookup("v2", "http://app.test/").await.unwrap(), None);
        assert_eq!(store.generations().await.unwrap(), vec!["v1", "v2"]);

        assert!(store.delete_generation("v1").await.unwrap());
        assert!(!store.delete_generation("v1").await.unwrap());
        assert_eq!(store.generations().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn put_all_replaces_entries() {
        let store = MemoryCacheStore::new();
        let old = CachedResponse::new(200, "text/plain", "old");
        let new = CachedResponse::new(200, "text/plain", "new");

        store.put("v1", "k", &old).await.unwrap();
        store
            .put_all("v1", &[("k".to_string(), new.clone()), ("j".to_string(), old.clone())])
            .await
            .unwrap();

        assert_eq!(store.lookup("v1", "k").await.unwrap(), Some(new));
        assert_eq!(store.keys("v1").await.unwrap(), vec!["j", "k"]);
    }
}
