//! In-memory cache store for testing.

use super::EntryInfoStream;
use crate::CacheStore;
use crate::error::Result;
use crate::models::{EntryInfo, StoredResponse};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory cache store for testing.
///
/// Entries are kept in a `BTreeMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation and listing order
/// is deterministic (sorted by key).
///
/// # Examples
///
/// ```ignore
/// use swcache_store::store::{MemoryStore, CacheStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::with_entries([
///     ("https://example.com/index.html", b"<html>...</html>"),
/// ]);
/// assert!(store.get("https://example.com/index.html").await?.is_some());
/// assert!(store.delete("https://example.com/index.html").await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    name: String,
    entries: RwLock<BTreeMap<String, (UtcDateTime, StoredResponse)>>,
}

impl MemoryStore {
    /// Create a store pre-populated with `200 OK` entries.
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let now = UtcDateTime::now();
        let map = entries
            .into_iter()
            .map(|(key, body)| (key.into(), (now, StoredResponse::ok(body))))
            .collect();
        Self {
            name: "memory".to_string(),
            entries: RwLock::new(map),
        }
    }

    /// Snapshot of the stored keys, sorted.
    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
impl Default for MemoryStore {
    fn default() -> Self {
        let entries: [(&str, &str); 0] = [];
        Self::with_entries(entries)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn keys_stream(&self) -> EntryInfoStream<'_> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding to
            // avoid holding the lock across yield points.
            let entries: Vec<EntryInfo> = {
                let guard = self.entries.read().await;
                guard
                    .iter()
                    .map(|(key, (stored_at, response))| EntryInfo::new(key, response.body.len() as u64, *stored_at))
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn get(&self, key: &str) -> Result<Option<StoredResponse>> {
        Ok(self.entries.read().await.get(key).map(|(_, response)| response.clone()))
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), (UtcDateTime::now(), response));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
