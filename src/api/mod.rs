//! API Module
//!
//! Thin HTTP layer over the Configuration repository.
//!
//! # Endpoints
//! - `GET|POST|PUT|DELETE /api/config` - Configuration CRUD
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
