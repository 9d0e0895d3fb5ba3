//! Selector matching
//!
//! A selector maps field names to expected values. A document matches when,
//! for every selector field, the document's value is strictly equal to the
//! expected value or is an array containing it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Document, ID_FIELD};

/// Field-name to expected-value mapping used to filter documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(Map<String, Value>);

impl Selector {
    /// An empty selector, which matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector on the `id` field.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().with(ID_FIELD, id.into())
    }

    /// Adds (or replaces) an expected field value.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Logical AND over all fields; a missing field is a non-match.
    pub fn matches(&self, doc: &Document) -> bool {
        self.0.iter().all(|(field, expected)| match doc.get(field) {
            Some(actual) if actual == expected => true,
            Some(Value::Array(items)) => items.contains(expected),
            _ => false,
        })
    }
}

impl From<Map<String, Value>> for Selector {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Returns the documents matching `selector`, preserving their order.
pub fn filter_by_selector(records: &[Document], selector: &Selector) -> Vec<Document> {
    records
        .iter()
        .filter(|doc| selector.matches(doc))
        .cloned()
        .collect()
}
