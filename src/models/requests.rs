//! Request DTOs for the API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Query string carrying an optional record id (`?id=...`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: Option<String>,
}

impl IdQuery {
    /// Returns the id when present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}
