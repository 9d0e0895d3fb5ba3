//! Cache Module
//!
//! Provides in-memory caching with TTL expiration.

mod data_cache;
mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use data_cache::DataCache;
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::ExpiringStore;
