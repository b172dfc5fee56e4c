/// Per-target audit trail of applied text.
///
/// Key schema (namespaced so it cannot collide with other data stored per target):
/// - `voice:v1:history:{target_id}`: JSON-serialized `Vec<HistoryItem>`, oldest first
///
/// `append` is read-modify-write and trims from the front to `capacity`. A failed read
/// aborts the append so stored history is never replaced by a partial list. Concurrent
/// appends to the same target are last-write-wins; disjoint targets never interact.
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::HistoryItem;
use mcp_common::kv::KeyValueStore;

const KEY_PREFIX: &str = "voice:v1:history:";
pub const DEFAULT_HISTORY_CAPACITY: usize = 3;

pub struct HistoryLedger {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
        }
    }

    /// Items for `target_id`, oldest first. Missing or corrupt history is empty; a store
    /// that cannot be read is an error.
    pub async fn recent(&self, target_id: &str) -> Result<Vec<HistoryItem>, AppError> {
        let key = history_key(target_id);
        let stored = self
            .store
            .get(&key)
            .await
            .map_err(|source| AppError::HistoryRead {
                target_id: target_id.to_string(),
                source,
            })?;
        let Some(json) = stored else {
            return Ok(Vec::new());
        };
        let mut items: Vec<HistoryItem> = serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "history deserialization failed, treating as empty"))
            .unwrap_or_default();
        trim_front(&mut items, self.capacity);
        Ok(items)
    }

    pub async fn append(
        &self,
        target_id: &str,
        text: &str,
        dataset_version: &str,
    ) -> Result<Vec<HistoryItem>, AppError> {
        let mut items = self.recent(target_id).await?;
        items.push(HistoryItem {
            text: text.to_string(),
            applied_at: Utc::now(),
            dataset_version: dataset_version.to_string(),
        });
        trim_front(&mut items, self.capacity);

        let key = history_key(target_id);
        let persisted = match serde_json::to_string(&items) {
            Ok(json) => self.store.set(&key, &json).await,
            Err(e) => {
                warn!(error = %e, key, "history serialization failed");
                false
            }
        };
        if !persisted {
            return Err(AppError::HistoryWrite {
                target_id: target_id.to_string(),
            });
        }

        info!(target_id, dataset_version, entries = items.len(), "history appended");
        Ok(items)
    }
}

fn history_key(target_id: &str) -> String {
    format!("{KEY_PREFIX}{target_id}")
}

fn trim_front(items: &mut Vec<HistoryItem>, capacity: usize) {
    if items.len() > capacity {
        items.drain(..items.len() - capacity);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use async_trait::async_trait;
    use mcp_common::error::CommonError;
    use mcp_common::kv::MemoryStore;

    fn ledger() -> (Arc<MemoryStore>, HistoryLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = HistoryLedger::new(store.clone(), DEFAULT_HISTORY_CAPACITY);
        (store, ledger)
    }

    fn texts(items: &[HistoryItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    #[tokio::test]
    async fn fourth_append_evicts_the_oldest() {
        let (_, ledger) = ledger();
        for text in ["A", "B", "C"] {
            ledger.append("42", text, "v1.3").await.unwrap();
        }
        assert_eq!(texts(&ledger.recent("42").await.unwrap()), ["A", "B", "C"]);

        let after = ledger.append("42", "D", "v1.3").await.unwrap();
        assert_eq!(texts(&after), ["B", "C", "D"]);
        assert_eq!(texts(&ledger.recent("42").await.unwrap()), ["B", "C", "D"]);
    }

    #[tokio::test]
    async fn items_record_dataset_version_and_time_order() {
        let (_, ledger) = ledger();
        ledger.append("7", "Save", "v1.2").await.unwrap();
        ledger.append("7", "Save changes", "v1.3").await.unwrap();

        let items = ledger.recent("7").await.unwrap();
        assert_eq!(items[0].dataset_version, "v1.2");
        assert_eq!(items[1].dataset_version, "v1.3");
        assert!(items[0].applied_at <= items[1].applied_at);
    }

    #[tokio::test]
    async fn targets_are_independent_and_namespaced() {
        let (store, ledger) = ledger();
        ledger.append("1", "One", "v1").await.unwrap();
        ledger.append("2", "Two", "v1").await.unwrap();

        assert_eq!(texts(&ledger.recent("1").await.unwrap()), ["One"]);
        assert_eq!(texts(&ledger.recent("2").await.unwrap()), ["Two"]);
        assert!(ledger.recent("3").await.unwrap().is_empty());
        assert!(store.get("voice:v1:history:1").await.unwrap().is_some());
        assert!(store.get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_or_oversized_history_is_repaired_on_read() {
        let (store, ledger) = ledger();
        store.set("voice:v1:history:9", "{not json").await;
        assert!(ledger.recent("9").await.unwrap().is_empty());
        assert_eq!(texts(&ledger.append("9", "Fresh", "v1").await.unwrap()), ["Fresh"]);

        let five: Vec<HistoryItem> = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|t| HistoryItem {
                text: t.to_string(),
                applied_at: Utc::now(),
                dataset_version: "v0".to_string(),
            })
            .collect();
        store
            .set("voice:v1:history:10", &serde_json::to_string(&five).unwrap())
            .await;
        assert_eq!(texts(&ledger.recent("10").await.unwrap()), ["c", "d", "e"]);
    }

    #[tokio::test]
    async fn capacity_is_configurable() {
        let ledger = HistoryLedger::new(Arc::new(MemoryStore::new()), 2);
        for text in ["A", "B", "C", "D"] {
            ledger.append("t", text, "v1").await.unwrap();
        }
        assert_eq!(texts(&ledger.recent("t").await.unwrap()), ["C", "D"]);
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CommonError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn failed_write_is_reported() {
        let ledger = HistoryLedger::new(Arc::new(ReadOnlyStore), DEFAULT_HISTORY_CAPACITY);
        let err = ledger.append("42", "Text", "v1").await.unwrap_err();
        assert!(matches!(err, AppError::HistoryWrite { ref target_id } if target_id == "42"));
    }

    /// Memory-backed store whose next read fails once `fail_next_read` is set.
    #[derive(Default)]
    struct DroppedConnectionStore {
        inner: MemoryStore,
        fail_next_read: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for DroppedConnectionStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
            if self.fail_next_read.swap(false, Ordering::SeqCst) {
                return Err(CommonError::RedisUnavailable);
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> bool {
            self.inner.set(key, value).await
        }
    }

    #[tokio::test]
    async fn failed_read_aborts_append_without_overwriting() {
        let store = Arc::new(DroppedConnectionStore::default());
        let ledger = HistoryLedger::new(store.clone(), DEFAULT_HISTORY_CAPACITY);
        for text in ["A", "B", "C"] {
            ledger.append("42", text, "v1.3").await.unwrap();
        }

        store.fail_next_read.store(true, Ordering::SeqCst);
        let err = ledger.append("42", "D", "v1.3").await.unwrap_err();
        assert!(matches!(err, AppError::HistoryRead { ref target_id, .. } if target_id == "42"));
        assert_eq!(texts(&ledger.recent("42").await.unwrap()), ["A", "B", "C"]);

        let after = ledger.append("42", "D", "v1.3").await.unwrap();
        assert_eq!(texts(&after), ["B", "C", "D"]);
    }
}
