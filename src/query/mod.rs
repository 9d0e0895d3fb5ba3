//! Query Module
//!
//! Selector filtering and sort specifications shared by the cache and the
//! document store backends.

mod selector;
mod sort;

pub use selector::{filter_by_selector, Selector};
pub use sort::{SortOrder, SortSpec};
