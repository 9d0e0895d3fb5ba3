//! Doc Cache - cache-aside access to a document store
//!
//! Serves repeated reads from a process-local TTL cache of collection
//! snapshots and keeps it consistent after writes and deletes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod query;
pub mod repository;
pub mod tasks;

pub use api::AppState;
pub use cache::DataCache;
pub use config::Config;
pub use error::{DataError, Result};
pub use gateway::{DocumentGateway, UpsertMode, UpsertOutcome};
pub use query::{Selector, SortSpec};
pub use repository::Repository;
pub use tasks::spawn_sweep_task;
