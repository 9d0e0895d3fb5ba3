//! Data models
//!
//! Record types stored through the repository, and the DTOs used for
//! serializing/deserializing HTTP request and response bodies.

pub mod configuration;
pub mod record;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use configuration::{Configuration, Message, Screen, CONFIGURATION_COLLECTION};
pub use record::{
    document_id, from_document, now_epoch_seconds, to_document, Document, Lifecycle, Record,
    ACTIVE_FIELD, CREATION_DATE_FIELD, ID_FIELD, LATEST_UPDATE_FIELD,
};
pub use requests::IdQuery;
pub use responses::{DeleteResponse, HealthResponse, StatsResponse};
