//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries every check period

mod cleanup;

pub use cleanup::spawn_sweep_task;
