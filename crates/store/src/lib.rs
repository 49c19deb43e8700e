//! Persistent response cache.
//!
//! Responses are stored under their normalized URL (the cache key). The
//! store is a plain key-value interface; deciding what is cacheable and what
//! is stale lives in `swcache-core`.

pub mod error;
mod models;
pub mod store;

pub use crate::models::{EntryInfo, StoredResponse};
pub use crate::store::CacheStore;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn CacheStore + Send + Sync>;
