//! Durable record of the last applied manifest version.

use crate::error::{ErrorKind, Result};
use crate::manifest::VersionTag;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use swcache_store::{StoreHandle, StoredResponse};

/// Reserved key of the version record. Not an `http(s)` URL, so no cached
/// response can ever collide with it.
pub const VERSION_KEY: &str = "swcache:version";

/// The client's last-known version, persisted as
/// `{"global": ..., "local": ..., "escape": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    /// Manifest epoch the client last saw.
    #[serde(default)]
    pub global: VersionTag,
    /// Version of the newest manifest entry applied.
    pub local: VersionTag,
    /// Escape counter; never derived from the manifest.
    #[serde(default)]
    pub escape: Option<u32>,
}

/// Reads and writes the [`VersionMarker`] in the response cache.
///
/// The marker is stored as a single entry, so every write replaces the whole
/// record at once.
#[derive(Clone)]
pub struct VersionStore {
    store: StoreHandle,
}

impl VersionStore {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// The stored marker, or `None` for a fresh installation.
    pub async fn read(&self) -> Result<Option<VersionMarker>> {
        let Some(response) = self.store.get(VERSION_KEY).await.or_raise(|| ErrorKind::Store)? else {
            return Ok(None);
        };
        let marker = serde_json::from_slice(&response.body).or_raise(|| ErrorKind::InvalidVersionRecord)?;
        Ok(Some(marker))
    }

    pub async fn write(&self, marker: &VersionMarker) -> Result<()> {
        let body = serde_json::to_vec(marker).or_raise(|| ErrorKind::InvalidVersionRecord)?;
        let response = StoredResponse::new(
            200,
            vec![("content-type".to_string(), "application/json".to_string())],
            body,
        );
        self.store.put(VERSION_KEY, response).await.or_raise(|| ErrorKind::Store)
    }
}
