//! In-memory document store
//!
//! Process-local database behind the gateway trait. Connections are scoped
//! guards counted while open, so callers can check that every operation
//! released its connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::{prepare_upsert, require_id, DocumentCheck, DocumentGateway, UpsertMode, UpsertOutcome};
use crate::error::{DataError, Result};
use crate::models::{document_id, now_epoch_seconds, Document};
use crate::query::{Selector, SortSpec};

/// Number of gateway operations served, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub find: u64,
    pub upsert: u64,
    pub delete: u64,
}

impl GatewayCalls {
    pub fn total(&self) -> u64 {
        self.find + self.upsert + self.delete
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    find: AtomicU64,
    upsert: AtomicU64,
    delete: AtomicU64,
}

// == Memory Document Store ==
#[derive(Debug)]
pub struct MemoryDocumentStore {
    db_name: String,
    collections: RwLock<HashMap<String, Vec<Document>>>,
    online: AtomicBool,
    writes_fail: AtomicBool,
    open_connections: AtomicUsize,
    calls: CallCounters,
}

/// Open connection; released when dropped.
struct Connection<'a> {
    store: &'a MemoryDocumentStore,
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.store.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryDocumentStore {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            collections: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            writes_fail: AtomicBool::new(false),
            open_connections: AtomicUsize::new(0),
            calls: CallCounters::default(),
        }
    }

    /// While offline, every connection attempt fails with a transport error.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// While set, writes fail after their validation passed.
    pub fn set_writes_fail(&self, fail: bool) {
        self.writes_fail.store(fail, Ordering::SeqCst);
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> GatewayCalls {
        GatewayCalls {
            find: self.calls.find.load(Ordering::SeqCst),
            upsert: self.calls.upsert.load(Ordering::SeqCst),
            delete: self.calls.delete.load(Ordering::SeqCst),
        }
    }

    /// Inserts documents directly, bypassing lifecycle stamping.
    pub async fn seed(&self, collection: &str, docs: Vec<Document>) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    /// Raw copy of a stored document.
    pub async fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)?
            .iter()
            .find(|doc| document_id(doc) == Some(id))
            .cloned()
    }

    fn connect(&self) -> Result<Connection<'_>> {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        let conn = Connection { store: self };

        if !self.online.load(Ordering::SeqCst) {
            // conn drops here and releases the slot
            return Err(DataError::Transport(format!(
                "database \"{}\" is unreachable",
                self.db_name
            )));
        }
        Ok(conn)
    }
}

#[async_trait]
impl DocumentGateway for MemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Selector,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Document>> {
        self.calls.find.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Getting documents (filter='{}') for collection \"{}\"...",
            serde_json::to_string(filter).unwrap_or_default(),
            collection
        );

        let _conn = self.connect().map_err(|e| {
            error!(
                "There was an error while trying to get documents for collection \"{}\": {}",
                collection, e
            );
            e
        })?;

        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default();

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
        self.calls.upsert.fetch_add(1, Ordering::SeqCst);
        let id = require_id(collection, &partial)?;
        let _conn = self.connect()?;

        // Lookup and replace-or-insert under one lock: single-document atomicity
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let position = docs.iter().position(|doc| document_id(doc) == Some(id.as_str()));

        debug!(
            "{} doc (docId='{}') in collection \"{}\"...",
            if position.is_some() { "Updating" } else { "Creating" },
            id,
            collection
        );

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

        if self.writes_fail.load(Ordering::SeqCst) {
            error!(
                "There was an error while trying to upsert document (docId='{}') in collection \"{}\"",
                id, collection
            );
            return Err(DataError::Transport(format!(
                "write of document \"{}\" was not acknowledged",
                id
            )));
        }

        match position {
            Some(i) => docs[i] = merged.clone(),
            None => docs.push(merged.clone()),
        }
        Ok(UpsertOutcome::Written(merged))
    }

    async fn delete_many(&self, collection: &str, filter: &Selector) -> Result<bool> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Deleting documents (filter='{}') for collection \"{}\"...",
            serde_json::to_string(filter).unwrap_or_default(),
            collection
        );

        let _conn = self.connect()?;

        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };

        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok(docs.len() < before)
    }
}
