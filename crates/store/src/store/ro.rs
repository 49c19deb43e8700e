//! Read-only cache store.
//!
//! This module provides a store that wraps another implementation and
//! prevents mutations from executing, while indicating success on return.

use async_trait::async_trait;

use crate::store::EntryInfoStream;
use crate::{CacheStore, StoreHandle, StoredResponse, error::Result};

/// Read-only cache store.
///
/// Wraps another store and silently drops all writes, logging an
/// [`info event`](tracing::Event). Deletes report whether the key *would*
/// have been removed, so a dry-run sweep lists the same keys as a real one.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CacheStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn keys_stream(&self) -> EntryInfoStream<'_> {
        self.inner.keys_stream()
    }

    async fn get(&self, key: &str) -> Result<Option<StoredResponse>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        tracing::info!(key, bytes = response.body.len(), "Skipping put during read-only mode");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        tracing::info!(key, "Skipping delete during read-only mode");
        Ok(self.inner.get(key).await?.is_some())
    }

    async fn clear(&self) -> Result<()> {
        tracing::info!(store = self.inner.name(), "Skipping clear during read-only mode");
        Ok(())
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mutations_are_dropped() {
        let inner = Arc::new(MemoryStore::with_entries([("https://example.com/", "x")]));
        let store = ReadOnlyStore::new(inner.clone());
        store.put("https://example.com/new", StoredResponse::ok("y")).await.unwrap();
        assert!(store.delete("https://example.com/").await.unwrap());
        assert!(!store.delete("https://example.com/missing").await.unwrap());
        store.clear().await.unwrap();
        assert_eq!(inner.snapshot().await, vec!["https://example.com/".to_string()]);
    }
}
