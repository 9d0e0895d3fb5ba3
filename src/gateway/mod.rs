//! Document Store Gateway
//!
//! Boundary to the persistent document store. Every operation opens its own
//! connection and releases it on every exit path.
//!
//! # Backends
//! - `memory://` - process-local database ([`MemoryDocumentStore`])
//! - `file://<dir>` - one JSON file per collection ([`FileDocumentStore`])

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{Config, EMPTY_ENV_VAR};
use crate::error::{DataError, Result};
use crate::models::{
    document_id, Document, ACTIVE_FIELD, CREATION_DATE_FIELD, LATEST_UPDATE_FIELD,
};
use crate::query::{Selector, SortSpec};

pub use file::FileDocumentStore;
pub use memory::{GatewayCalls, MemoryDocumentStore};

/// Existence precondition applied by [`DocumentGateway::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Fails with `AlreadyExists` if the id is taken
    Create,
    /// Fails with `DoesNotExist` if the id is unknown
    Update,
    /// Creates or merges without precondition
    Upsert,
}

/// Result of an upsert that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// The full document as persisted
    Written(Document),
    AlreadyExists,
    DoesNotExist,
    SecurityCheckFailed,
}

/// Check run on the merged document right before it is persisted. An error
/// aborts the write and leaves the store untouched.
pub type DocumentCheck = dyn Fn(&Document) -> Result<()> + Send + Sync;

/// Persistent document store primitives.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Returns every document of `collection` matching `filter`, sorted by
    /// `sort` when given. Empty when nothing matches.
    async fn find(
        &self,
        collection: &str,
        filter: &Selector,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Document>>;

    /// Merges `partial` onto the document with the same id, or inserts it.
    ///
    /// Existence and security-check rejections come back as outcomes. Store
    /// failures and a failed `validate` are errors.
    async fn upsert(
        &self,
        collection: &str,
        partial: Document,
        mode: UpsertMode,
        security_check: Option<&Selector>,
        validate: Option<&DocumentCheck>,
    ) -> Result<UpsertOutcome>;

    /// Removes every matching document. True iff at least one was removed.
    async fn delete_many(&self, collection: &str, filter: &Selector) -> Result<bool>;
}

/// Opens the gateway named by the configured endpoint.
pub fn open_gateway(config: &Config) -> Result<Arc<dyn DocumentGateway>> {
    let endpoint = config.db_connection_string.as_str();

    if let Some(root) = endpoint.strip_prefix("file://") {
        info!(
            "Using file document store at \"{}\" (db \"{}\")",
            root, config.db_name
        );
        return Ok(Arc::new(FileDocumentStore::new(root, &config.db_name)));
    }

    if endpoint == EMPTY_ENV_VAR {
        warn!("DB_CONNECTION_STRING is not set, falling back to an in-memory document store");
        return Ok(Arc::new(MemoryDocumentStore::new(&config.db_name)));
    }

    if endpoint.starts_with("memory://") {
        info!("Using in-memory document store (db \"{}\")", config.db_name);
        return Ok(Arc::new(MemoryDocumentStore::new(&config.db_name)));
    }

    Err(DataError::Transport(format!(
        "Unsupported document store endpoint \"{}\"",
        endpoint
    )))
}

/// Validates an upsert against the existing document and builds the document
/// to persist. Shared by every backend.
pub(crate) fn prepare_upsert(
    collection: &str,
    existing: Option<&Document>,
    partial: Document,
    mode: UpsertMode,
    security_check: Option<&Selector>,
    now: i64,
) -> std::result::Result<Document, UpsertOutcome> {
    let id = document_id(&partial).unwrap_or_default();

    match (mode, existing) {
        (UpsertMode::Create, Some(_)) => {
            error!(
                "Trying to create a document (docId='{}') that already exists in collection \"{}\"",
                id, collection
            );
            return Err(UpsertOutcome::AlreadyExists);
        }
        (UpsertMode::Update, None) => {
            error!(
                "Trying to update a document (docId='{}') that doesn't exist in collection \"{}\"",
                id, collection
            );
            return Err(UpsertOutcome::DoesNotExist);
        }
        _ => {}
    }

    if let (Some(existing), Some(check)) = (existing, security_check) {
        let passed = check
            .fields()
            .all(|(field, expected)| existing.get(field) == Some(expected));
        if !passed {
            warn!(
                "Security check failed for document (docId='{}') in collection \"{}\"",
                id, collection
            );
            return Err(UpsertOutcome::SecurityCheckFailed);
        }
    }

    let merged = match existing {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.extend(partial);
            merged.insert(LATEST_UPDATE_FIELD.to_string(), Value::from(now));
            merged
        }
        None => {
            let mut created = partial;
            created.insert(ACTIVE_FIELD.to_string(), Value::Bool(true));
            created.insert(CREATION_DATE_FIELD.to_string(), Value::from(now));
            created.insert(LATEST_UPDATE_FIELD.to_string(), Value::from(now));
            created
        }
    };

    Ok(merged)
}

/// Rejects documents the store cannot key.
pub(crate) fn require_id(collection: &str, partial: &Document) -> Result<String> {
    match document_id(partial) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(DataError::InvalidDocument(format!(
            "document for collection \"{}\" has no string id",
            collection
        ))),
    }
}
