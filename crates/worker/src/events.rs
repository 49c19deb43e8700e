use serde::{Deserialize, Serialize};
use swcache_core::VersionMarker;

/// Message posted to connected pages.
///
/// Serialized with a `type` tag, e.g. `{"type":"escape"}` or
/// `{"type":"update","update":null,"version":{...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    /// The whole cache was wiped because the escape counter changed.
    Escape,
    /// Result of an update check: the evicted keys (`None` when nothing was
    /// evicted) and the version now recorded.
    Update {
        update: Option<Vec<String>>,
        version: VersionMarker,
    },
}
