//! Data Cache Module
//!
//! Process-local cache of collection snapshots and ad-hoc keyed values on top
//! of [`ExpiringStore`]. Each read-modify-write sequence runs under a single
//! write-lock acquisition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ExpiringStore};
use crate::models::{document_id, Document};
use crate::query::{filter_by_selector, Selector};

// == Data Cache ==
/// Shared cache instance, passed by `Arc` to every repository.
#[derive(Debug)]
pub struct DataCache {
    store: RwLock<ExpiringStore<Value>>,
    /// Bumped under the write lock by every snapshot patch, warm or cold
    generation: AtomicU64,
}

impl DataCache {
    // == Constructor ==
    /// Creates an empty cache whose entries expire `ttl` after their last set.
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: RwLock::new(ExpiringStore::new(ttl)),
            generation: AtomicU64::new(0),
        }
    }

    // == Collection Snapshots ==
    /// Returns an owned copy of the snapshot for `collection`, or `None` when cold.
    ///
    /// A slot holding anything other than an array of objects reads as cold.
    pub async fn get_collection(&self, collection: &str) -> Option<Vec<Document>> {
        let value = self.store.write().await.get(collection)?;
        snapshot_from_value(value)
    }

    pub async fn get_from_collection_by_id(&self, collection: &str, id: &str) -> Option<Document> {
        self.get_collection(collection)
            .await?
            .into_iter()
            .find(|doc| document_id(doc) == Some(id))
    }

    pub async fn get_from_collection_by_selector(
        &self,
        collection: &str,
        selector: &Selector,
    ) -> Option<Document> {
        self.get_many_from_collection_by_selector(collection, selector)
            .await?
            .into_iter()
            .next()
    }

    /// Filters the snapshot; `None` when the collection is cold.
    pub async fn get_many_from_collection_by_selector(
        &self,
        collection: &str,
        selector: &Selector,
    ) -> Option<Vec<Document>> {
        let snapshot = self.get_collection(collection).await?;
        Some(filter_by_selector(&snapshot, selector))
    }

    /// Replaces the whole snapshot and restarts its TTL window.
    pub async fn set_collection(&self, collection: &str, docs: Vec<Document>) -> bool {
        self.store
            .write()
            .await
            .set(collection, snapshot_to_value(docs))
    }

    /// Patch counter to pass to
    /// [`set_collection_if_unchanged`](Self::set_collection_if_unchanged).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stores a snapshot read from the store, unless a patch landed since
    /// `generation` was taken. Returns false when the snapshot was discarded.
    pub async fn set_collection_if_unchanged(
        &self,
        collection: &str,
        docs: Vec<Document>,
        generation: u64,
    ) -> bool {
        let mut store = self.store.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(
                "Discarding stale snapshot for collection \"{}\"",
                collection
            );
            return false;
        }
        store.set(collection, snapshot_to_value(docs))
    }

    /// Replaces the document with the same id, or appends it.
    ///
    /// Does nothing on a cold collection, so a partial snapshot is never
    /// created. Returns false in that case.
    pub async fn update_collection(&self, collection: &str, updated: Document) -> bool {
        let Some(id) = document_id(&updated).map(str::to_string) else {
            warn!(
                "Ignoring cache update without id for collection \"{}\"",
                collection
            );
            return false;
        };

        let mut store = self.store.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(mut snapshot) = store.get(collection).and_then(snapshot_from_value) else {
            return false;
        };

        match snapshot
            .iter_mut()
            .find(|doc| document_id(doc) == Some(id.as_str()))
        {
            Some(existing) => *existing = updated,
            None => snapshot.push(updated),
        }

        store.set(collection, snapshot_to_value(snapshot))
    }

    /// Prunes the document with `id` from a warm snapshot. A cold collection
    /// has nothing to prune and reports success.
    pub async fn remove_from_collection(&self, collection: &str, id: &str) -> bool {
        let mut store = self.store.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(mut snapshot) = store.get(collection).and_then(snapshot_from_value) else {
            return true;
        };

        snapshot.retain(|doc| document_id(doc) != Some(id));
        store.set(collection, snapshot_to_value(snapshot))
    }

    // == Generic Keys ==
    /// Caches an arbitrary serializable value under `key`.
    pub async fn save_by_key<V: Serialize>(&self, key: &str, value: &V) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.store.write().await.set(key, value),
            Err(e) => {
                warn!("Could not cache value for key \"{}\": {}", key, e);
                false
            }
        }
    }

    /// Reads a value saved with [`save_by_key`](Self::save_by_key); a value
    /// of the wrong shape reads as absent.
    pub async fn get_by_key<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let value = self.store.write().await.get(key)?;
        serde_json::from_value(value).ok()
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    // == Maintenance ==
    /// Removes expired entries. Called by the sweep task.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        info!(
            "Mem cache stats: hits={}, misses={}, keys={}, expirations={}",
            stats.hits, stats.misses, stats.keys, stats.expirations
        );
    }

    pub async fn flush_all(&self) {
        warn!("Resetting all cache...");
        self.store.write().await.flush_all();
    }
}

fn snapshot_to_value(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}

fn snapshot_from_value(value: Value) -> Option<Vec<Document>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(doc) => Some(doc),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
