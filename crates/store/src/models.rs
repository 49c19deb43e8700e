//! Store models.

use time::UtcDateTime;

/// A response as held by the cache.
///
/// Only what is needed to replay the response to a client is kept: status,
/// headers (in received order) and the body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
impl StoredResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A `200 OK` response without headers.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, Vec::new(), body)
    }
}

/// Metadata about a stored entry, returned when listing a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Cache key (normalized URL) the entry is stored under
    pub key: String,
    /// Body size in bytes
    pub size: u64,
    /// When the entry was last written
    pub stored_at: UtcDateTime,
}
impl EntryInfo {
    pub fn new(key: impl Into<String>, size: u64, stored_at: UtcDateTime) -> Self {
        Self {
            key: key.into(),
            size,
            stored_at,
        }
    }
}
