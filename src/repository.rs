//! Cache-Aside Repository
//!
//! Generic data access for one collection. Reads are served from the cached
//! snapshot when warm; a miss (or a filtered-empty result, which may just be a
//! stale snapshot) is disambiguated by a real store read that then repairs
//! the cache. Writes go to the store first and patch the snapshot on success.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::DataCache;
use crate::error::{DataError, Result};
use crate::gateway::{DocumentCheck, DocumentGateway, UpsertMode, UpsertOutcome};
use crate::models::record::from_documents;
use crate::models::{from_document, to_document, Document, Record};
use crate::query::{filter_by_selector, Selector, SortSpec};

// == Repository ==
pub struct Repository<T> {
    collection: String,
    cache_enabled: bool,
    cache: Arc<DataCache>,
    gateway: Arc<dyn DocumentGateway>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Repository<T> {
    pub fn new(
        collection: impl Into<String>,
        cache: Arc<DataCache>,
        gateway: Arc<dyn DocumentGateway>,
    ) -> Self {
        Self {
            collection: collection.into(),
            cache_enabled: true,
            cache,
            gateway,
            _record: PhantomData,
        }
    }

    /// Turns caching on or off for this repository.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    // == Reads ==

    /// Returns the whole collection.
    ///
    /// A warm snapshot is returned as-is; `sort` only applies on the cold path.
    pub async fn get_all(&self, sort: Option<&SortSpec>) -> Result<Vec<T>> {
        from_documents(self.snapshot(sort).await?)
    }

    /// Returns every record matching `selector`.
    ///
    /// Fails with `NotFound` when a store read confirms there is no match.
    pub async fn get_by_selector(
        &self,
        selector: &Selector,
        sort: Option<&SortSpec>,
        force_refresh: bool,
    ) -> Result<Vec<T>> {
        if !self.cache_enabled {
            return from_documents(self.gateway.find(&self.collection, selector, sort).await?);
        }

        let snapshot = self.snapshot(sort).await?;
        let cached = filter_by_selector(&snapshot, selector);
        if !cached.is_empty() && !force_refresh {
            return from_documents(cached);
        }

        // Probable cache miss, or a refresh was forced
        debug!(
            "Cache miss on collection \"{}\", querying the store",
            self.collection
        );
        let docs = self.gateway.find(&self.collection, selector, sort).await?;
        let Some(first) = docs.first() else {
            return Err(DataError::NotFound(format!(
                "no document in \"{}\" matches {}",
                self.collection,
                serde_json::to_string(selector).unwrap_or_default()
            )));
        };

        self.cache
            .update_collection(&self.collection, first.clone())
            .await;
        from_documents(docs)
    }

    /// First record matching `selector`.
    pub async fn get_one_by_selector(
        &self,
        selector: &Selector,
        sort: Option<&SortSpec>,
        force_refresh: bool,
    ) -> Result<T> {
        self.get_by_selector(selector, sort, force_refresh)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::NotFound(format!("empty result in \"{}\"", self.collection)))
    }

    pub async fn get_by_id(
        &self,
        id: &str,
        sort: Option<&SortSpec>,
        force_refresh: bool,
    ) -> Result<T> {
        self.get_one_by_selector(&Selector::by_id(id), sort, force_refresh)
            .await
    }

    /// Like [`get_one_by_selector`](Self::get_one_by_selector), with no match as `None`.
    pub async fn try_get_by_selector(
        &self,
        selector: &Selector,
        sort: Option<&SortSpec>,
        force_refresh: bool,
    ) -> Result<Option<T>> {
        match self.get_one_by_selector(selector, sort, force_refresh).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`get_by_selector`](Self::get_by_selector), with no match as an empty vec.
    pub async fn try_get_many_by_selector(
        &self,
        selector: &Selector,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<T>> {
        match self.get_by_selector(selector, sort, false).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    // == Writes ==

    /// Inserts a new record. Fails with `AlreadyExists` if the id is taken.
    pub async fn create<P: Serialize + ?Sized>(&self, partial: &P) -> Result<T> {
        let partial = to_document(partial)?;
        match self.write(partial, UpsertMode::Create, None).await? {
            UpsertOutcome::Written(doc) => self.patch_cache(doc).await,
            other => Err(self.rejection(other)),
        }
    }

    /// Merges fields onto an existing record.
    ///
    /// Fails with `NotFound` if the id is unknown and `Unauthorized` if the
    /// stored record does not match `security_check`.
    pub async fn update<P: Serialize + ?Sized>(
        &self,
        partial: &P,
        security_check: Option<&Selector>,
    ) -> Result<T> {
        let partial = to_document(partial)?;
        match self.write(partial, UpsertMode::Update, security_check).await? {
            UpsertOutcome::Written(doc) => self.patch_cache(doc).await,
            UpsertOutcome::DoesNotExist => Err(DataError::NotFound(format!(
                "cannot update missing document in \"{}\"",
                self.collection
            ))),
            other => Err(self.rejection(other)),
        }
    }

    /// Creates or merges without an existence precondition.
    pub async fn upsert<P: Serialize + ?Sized>(&self, partial: &P) -> Result<T> {
        let partial = to_document(partial)?;
        match self.write(partial, UpsertMode::Upsert, None).await? {
            UpsertOutcome::Written(doc) => self.patch_cache(doc).await,
            other => Err(self.rejection(other)),
        }
    }

    /// Deletes the record with `id`. Returns whether the store removed anything.
    ///
    /// The id is pruned from the snapshot before the store is asked, whatever
    /// the store outcome.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        if self.cache_enabled {
            self.cache.remove_from_collection(&self.collection, id).await;
        }
        self.gateway
            .delete_many(&self.collection, &Selector::by_id(id))
            .await
    }

    // == Internals ==

    /// Warm snapshot, or a full store read that becomes the new snapshot.
    async fn snapshot(&self, sort: Option<&SortSpec>) -> Result<Vec<Document>> {
        if self.cache_enabled {
            if let Some(cached) = self.cache.get_collection(&self.collection).await {
                return Ok(cached);
            }
        }

        // A patch landing while the read is in flight makes `docs` stale
        let generation = self.cache.generation();
        let docs = self
            .gateway
            .find(&self.collection, &Selector::new(), sort)
            .await?;

        // A disabled repository never warms the shared cache, or a later
        // enabled reader could serve a snapshot no write ever patched
        if self.cache_enabled {
            self.cache
                .set_collection_if_unchanged(&self.collection, docs.clone(), generation)
                .await;
        }
        Ok(docs)
    }

    async fn write(
        &self,
        partial: Document,
        mode: UpsertMode,
        security_check: Option<&Selector>,
    ) -> Result<UpsertOutcome> {
        // The merged document must read back as `T`, or it is never stored
        let fits_record = |doc: &Document| from_document::<T>(doc.clone()).map(drop);
        self.gateway
            .upsert(
                &self.collection,
                partial,
                mode,
                security_check,
                Some(&fits_record as &DocumentCheck),
            )
            .await
            .inspect_err(|e| {
                if let DataError::InvalidDocument(reason) = e {
                    warn!(
                        "Rejected write on collection \"{}\": {}",
                        self.collection, reason
                    );
                }
            })
    }

    async fn patch_cache(&self, doc: Document) -> Result<T> {
        if self.cache_enabled {
            self.cache
                .update_collection(&self.collection, doc.clone())
                .await;
        }
        from_document(doc)
    }

    fn rejection(&self, outcome: UpsertOutcome) -> DataError {
        warn!(
            "Write rejected on collection \"{}\": {:?}",
            self.collection, outcome
        );
        match outcome {
            UpsertOutcome::AlreadyExists => {
                DataError::AlreadyExists(format!("document already exists in \"{}\"", self.collection))
            }
            UpsertOutcome::DoesNotExist => {
                DataError::DoesNotExist(format!("document does not exist in \"{}\"", self.collection))
            }
            UpsertOutcome::SecurityCheckFailed => DataError::Unauthorized(format!(
                "security check failed on \"{}\"",
                self.collection
            )),
            UpsertOutcome::Written(_) => {
                DataError::Transport("unexpected write outcome".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryDocumentStore;
    use crate::models::Lifecycle;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Screen {
        id: String,
        #[serde(default)]
        num_code: serde_json::Value,
        #[serde(flatten)]
        lifecycle: Lifecycle,
    }

    impl Record for Screen {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn setup() -> (Arc<MemoryDocumentStore>, Arc<DataCache>, Repository<Screen>) {
        let store = Arc::new(MemoryDocumentStore::new("test"));
        let cache = Arc::new(DataCache::new(Duration::from_secs(300)));
        let repo = Repository::new("Screen", cache.clone(), store.clone());
        (store, cache, repo)
    }

    #[tokio::test]
    async fn test_get_all_warms_cache_once() {
        let (store, cache, repo) = setup();
        repo.create(&json!({"id": "a"})).await.unwrap();

        let first = repo.get_all(None).await.unwrap();
        let second = repo.get_all(None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls().find, 1);
        assert_eq!(cache.get_collection("Screen").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sort_ignored_on_warm_snapshot() {
        let (store, _cache, repo) = setup();
        store
            .seed(
                "Screen",
                vec![
                    json!({"id": "b"}).as_object().cloned().unwrap(),
                    json!({"id": "a"}).as_object().cloned().unwrap(),
                ],
            )
            .await;

        let sorted = repo.get_all(Some(&SortSpec::ascending("id"))).await.unwrap();
        assert_eq!(sorted[0].id, "a");

        let descending = repo.get_all(Some(&SortSpec::descending("id"))).await.unwrap();
        assert_eq!(descending, sorted);
    }

    #[tokio::test]
    async fn test_filtered_empty_falls_through_and_repairs() {
        let (store, cache, repo) = setup();
        repo.get_all(None).await.unwrap();

        // Written behind the cache's back
        store
            .seed("Screen", vec![json!({"id": "late", "numCode": 5}).as_object().cloned().unwrap()])
            .await;

        let found = repo.get_by_id("late", None, false).await.unwrap();
        assert_eq!(found.id, "late");
        assert!(cache.get_from_collection_by_id("Screen", "late").await.is_some());
        assert_eq!(store.calls().find, 2);
    }

    #[tokio::test]
    async fn test_not_found_after_store_read() {
        let (store, _cache, repo) = setup();

        let err = repo.get_by_id("ghost", None, false).await.unwrap_err();
        assert!(err.is_not_found());
        // getAll on the cold cache, then the targeted read
        assert_eq!(store.calls().find, 2);

        assert!(repo.try_get_by_selector(&Selector::by_id("ghost"), None, false).await.unwrap().is_none());
        assert!(repo.try_get_many_by_selector(&Selector::by_id("ghost"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_force_refresh_reads_store() {
        let (store, _cache, repo) = setup();
        repo.create(&json!({"id": "a", "numCode": 1})).await.unwrap();
        repo.get_by_id("a", None, false).await.unwrap();
        let before = store.calls().find;

        repo.get_by_id("a", None, true).await.unwrap();
        assert_eq!(store.calls().find, before + 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_reads_store() {
        let (store, cache, repo) = setup();
        let repo = repo.with_cache(false);
        assert!(!repo.cache_enabled());

        repo.create(&json!({"id": "a"})).await.unwrap();
        repo.get_all(None).await.unwrap();
        repo.get_all(None).await.unwrap();
        let found = repo.get_by_selector(&Selector::by_id("a"), None, false).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(store.calls().find, 3);
        assert!(cache.get_collection("Screen").await.is_none());
    }

    #[tokio::test]
    async fn test_transport_errors_are_not_downgraded() {
        let (store, _cache, repo) = setup();
        store.set_online(false);

        let result = repo.try_get_by_selector(&Selector::by_id("a"), None, false).await;
        assert!(matches!(result, Err(DataError::Transport(_))));

        let result = repo.try_get_many_by_selector(&Selector::by_id("a"), None).await;
        assert!(matches!(result, Err(DataError::Transport(_))));
    }

    #[tokio::test]
    async fn test_upsert_patches_cache() {
        let (_store, cache, repo) = setup();
        repo.get_all(None).await.unwrap();

        let created = repo.upsert(&json!({"id": "a", "numCode": 1})).await.unwrap();
        assert_eq!(created.lifecycle.active, Some(true));

        let merged = repo.upsert(&json!({"id": "a", "numCode": 2})).await.unwrap();
        assert_eq!(merged.num_code, json!(2));
        assert_eq!(merged.lifecycle.creation_date, created.lifecycle.creation_date);

        let cached = cache.get_from_collection_by_id("Screen", "a").await.unwrap();
        assert_eq!(cached["numCode"], 2);
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let (_store, _cache, repo) = setup();
        let err = repo.create(&json!(["not", "an", "object"])).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidDocument(_)));
    }
}
