//! File-backed document store
//!
//! Keeps each collection as a JSON array in `<root>/<db>/<collection>.json`.
//! A connection holds the store lock for the whole operation; writes go to a
//! temporary file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

use super::{prepare_upsert, require_id, DocumentCheck, DocumentGateway, UpsertMode, UpsertOutcome};
use crate::error::{DataError, Result};
use crate::models::{document_id, now_epoch_seconds, Document};
use crate::query::{Selector, SortSpec};

#[derive(Debug)]
pub struct FileDocumentStore {
    db_dir: PathBuf,
    lock: Mutex<()>,
}

/// Open connection to the database directory; released when dropped.
struct Connection<'a> {
    db_dir: &'a Path,
    _guard: MutexGuard<'a, ()>,
}

impl FileDocumentStore {
    pub fn new(root: impl AsRef<Path>, db_name: &str) -> Self {
        Self {
            db_dir: root.as_ref().join(db_name),
            lock: Mutex::new(()),
        }
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    async fn connect(&self) -> Result<Connection<'_>> {
        let guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.db_dir).await?;
        Ok(Connection {
            db_dir: &self.db_dir,
            _guard: guard,
        })
    }
}

impl Connection<'_> {
    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(DataError::InvalidDocument(format!(
                "invalid collection name \"{}\"",
                collection
            )));
        }
        Ok(self.db_dir.join(format!("{}.json", collection)))
    }

    async fn read(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(collection)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            DataError::Transport(format!("corrupt collection file {}: {}", path.display(), e))
        })
    }

    async fn write(&self, collection: &str, docs: &[Document]) -> Result<()> {
        let path = self.collection_path(collection)?;
        let tmp = path.with_extension("json.tmp");
        let bytes =
            serde_json::to_vec_pretty(docs).map_err(|e| DataError::Transport(e.to_string()))?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentGateway for FileDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Selector,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Document>> {
        debug!(
            "Getting documents (filter='{}') for collection \"{}\"...",
            serde_json::to_string(filter).unwrap_or_default(),
            collection
        );

        let conn = self.connect().await?;
        let mut docs: Vec<Document> = conn
            .read(collection)
            .await
            .map_err(|e| {
                error!(
                    "There was an error while trying to get documents for collection \"{}\": {}",
                    collection, e
                );
                e
            })?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect();

        if let Some(sort) = sort {
            sort.apply(&mut docs);
        }
        Ok(docs)
    }

    async fn upsert(
        &self,
        collection: &str,
        partial: Document,
        mode: UpsertMode,
        security_check: Option<&Selector>,
        validate: Option<&DocumentCheck>,
    ) -> Result<UpsertOutcome> {
        let id = require_id(collection, &partial)?;
        let conn = self.connect().await?;

        let mut docs = conn.read(collection).await?;
        let position = docs.iter().position(|doc| document_id(doc) == Some(id.as_str()));

        let merged = match prepare_upsert(
            collection,
            position.map(|i| &docs[i]),
            partial,
            mode,
            security_check,
            now_epoch_seconds(),
        ) {
            Ok(merged) => merged,
            Err(outcome) => return Ok(outcome),
        };

        if let Some(validate) = validate {
            validate(&merged)?;
        }

        match position {
            Some(i) => docs[i] = merged.clone(),
            None => docs.push(merged.clone()),
        }

        conn.write(collection, &docs).await.map_err(|e| {
            error!(
                "There was an error while trying to upsert document (docId='{}') in collection \"{}\": {}",
                id, collection, e
            );
            e
        })?;
        Ok(UpsertOutcome::Written(merged))
    }

    async fn delete_many(&self, collection: &str, filter: &Selector) -> Result<bool> {
        debug!(
            "Deleting documents (filter='{}') for collection \"{}\"...",
            serde_json::to_string(filter).unwrap_or_default(),
            collection
        );

        let conn = self.connect().await?;
        let mut docs = conn.read(collection).await?;

        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        if docs.len() == before {
            return Ok(false);
        }

        conn.write(collection, &docs).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_documents_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileDocumentStore::new(dir.path(), "db");
        let outcome = store
            .upsert("Configuration", doc(json!({"id": "a", "heartbeat": 5})), UpsertMode::Create, None, None)
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Written(_)));
        assert!(store.db_dir().join("Configuration.json").exists());

        let reopened = FileDocumentStore::new(dir.path(), "db");
        let found = reopened
            .find("Configuration", &Selector::by_id("a"), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["heartbeat"], 5);
        assert_eq!(found[0]["active"], true);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path(), "db");

        assert!(store.find("Nothing", &Selector::new(), None).await.unwrap().is_empty());
        assert!(!store.delete_many("Nothing", &Selector::by_id("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path(), "db");

        store
            .upsert("C", doc(json!({"id": "a", "owner": "u1"})), UpsertMode::Create, None, None)
            .await
            .unwrap();

        let denied = store
            .upsert(
                "C",
                doc(json!({"id": "a", "name": "x"})),
                UpsertMode::Update,
                Some(&Selector::new().with("owner", "u2")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(denied, UpsertOutcome::SecurityCheckFailed);

        let outcome = store
            .upsert("C", doc(json!({"id": "a", "name": "x"})), UpsertMode::Update, None, None)
            .await
            .unwrap();
        let UpsertOutcome::Written(updated) = outcome else {
            panic!("expected a written document");
        };
        assert_eq!(updated["owner"], "u1");
        assert_eq!(updated["name"], "x");

        assert!(store.delete_many("C", &Selector::by_id("a")).await.unwrap());
        assert!(store.find("C", &Selector::new(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_collection_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path(), "db");

        let result = store.find("../escape", &Selector::new(), None).await;
        assert!(matches!(result, Err(DataError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path(), "db");
        std::fs::create_dir_all(store.db_dir()).unwrap();
        std::fs::write(store.db_dir().join("C.json"), b"not json").unwrap();

        let result = store.find("C", &Selector::new(), None).await;
        assert!(matches!(result, Err(DataError::Transport(_))));
    }
}
