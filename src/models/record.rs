//! Record model shared by every collection
//!
//! Documents travel through the gateway and the cache as JSON objects; typed
//! records are converted at the repository boundary.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DataError, Result};

/// Raw stored form of a record.
pub type Document = Map<String, Value>;

/// Field holding the record identifier.
pub const ID_FIELD: &str = "id";
pub const ACTIVE_FIELD: &str = "active";
pub const CREATION_DATE_FIELD: &str = "creationDate";
pub const LATEST_UPDATE_FIELD: &str = "latestUpdate";

/// A typed entity stored in exactly one named collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Unique, immutable identifier within the collection.
    fn id(&self) -> &str;
}

/// Lifecycle attributes stamped by the store.
///
/// Flatten into a record with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Seconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<i64>,
    /// Seconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_update: Option<i64>,
}

/// Current time in whole seconds since the Unix epoch.
pub fn now_epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns the `id` field of a document, if it is a string.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Serializes any value into a document; it must serialize to a JSON object.
pub fn to_document<P: Serialize + ?Sized>(value: &P) -> Result<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DataError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(DataError::InvalidDocument(e.to_string())),
    }
}

/// Deserializes a document into a typed record.
pub fn from_document<T: Record>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| DataError::InvalidDocument(e.to_string()))
}

pub(crate) fn from_documents<T: Record>(docs: Vec<Document>) -> Result<Vec<T>> {
    docs.into_iter().map(from_document).collect()
}
