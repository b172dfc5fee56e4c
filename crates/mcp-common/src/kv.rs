/// Minimal string key-value contract used for per-target persistent state.
///
/// `RedisCache` implements it for production; `MemoryStore` is the process-local
/// stand-in used when Redis is not configured or not reachable.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CommonError;
use crate::redis::RedisCache;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` if the key is absent. A store that cannot be read returns an error,
    /// never `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError>;

    /// Returns `true` if the value was persisted.
    async fn set(&self, key: &str, value: &str) -> bool;
}

#[async_trait]
impl KeyValueStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        RedisCache::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str) -> bool {
        RedisCache::set(self, key, value).await
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> bool {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);

        assert!(store.set("voice:k", "one").await);
        assert!(store.set("voice:k", "two").await);
        assert_eq!(store.get("voice:k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn unconfigured_redis_reads_fail_and_writes_report_false() {
        let redis = RedisCache::new(None);
        let store: &dyn KeyValueStore = &redis;
        assert!(matches!(
            store.get("anything").await,
            Err(CommonError::RedisUnavailable)
        ));
        assert!(!store.set("anything", "value").await);
    }
}
