//! Cache store trait and implementations.
//!
//! This module defines the `CacheStore` trait, the single persistent resource
//! shared by request interception and update checks. Implementations exist
//! for a local directory, for tests (in memory), and as a read-only decorator.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MemoryStore;
pub use self::ro::ReadOnlyStore;
use crate::error::Result;
use crate::models::{EntryInfo, StoredResponse};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub type EntryInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<EntryInfo>> + Send + 'a>>;

/// Unified interface for response cache stores.
///
/// Semantics follow a browser cache: `put` overwrites, `get` is a lookup
/// that may miss, `delete` reports whether anything was removed. Operations
/// on different keys are independent; a single `put` replaces the whole
/// entry or nothing.
///
/// # Examples
///
/// ```
/// use swcache_store::{CacheStore, StoredResponse, error::Result};
///
/// async fn refresh(store: &dyn CacheStore, key: &str, body: &[u8]) -> Result<bool> {
///     let existed = store.delete(key).await?;
///     store.put(key, StoredResponse::ok(body)).await?;
///     Ok(existed)
/// }
/// ```
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Name of the store (for logging only).
    fn name(&self) -> &str;

    /// List every stored entry.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`keys_stream()`](Self::keys_stream) into a [`Vec`] before
    /// returning.
    async fn keys(&self) -> Result<Vec<EntryInfo>> {
        self.keys_stream().try_collect().await
    }

    /// Stream metadata for every stored entry.
    ///
    /// Entries written or deleted while the stream is being consumed may or
    /// may not be observed.
    fn keys_stream(&self) -> EntryInfoStream<'_>;

    /// Look up the response stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<StoredResponse>>;

    /// Store a response, replacing any existing entry for `key`.
    async fn put(&self, key: &str, response: StoredResponse) -> Result<()>;

    /// Remove the entry for `key`.
    ///
    /// Returns `false` if nothing was stored under the key.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry, including reserved records.
    async fn clear(&self) -> Result<()>;
}
