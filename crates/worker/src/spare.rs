//! Alternate origins for requests the cache does not handle.

use url::Url;

/// Maps a request URL to an alternate URL to fetch instead.
pub trait SpareResolver: Send + Sync {
    fn resolve(&self, url: &Url) -> Option<Url>;
}

/// Serves every request for `host` from the same path under `mirror`.
///
/// ```
/// use swcache_worker::{HostMirror, SpareResolver};
/// use url::Url;
///
/// let mirror = HostMirror::new("cdn.example.com", Url::parse("https://mirror.example.net/cdn/").unwrap());
/// let spare = mirror.resolve(&Url::parse("https://cdn.example.com/lib.js?v=2").unwrap());
/// assert_eq!(spare.unwrap().as_str(), "https://mirror.example.net/cdn/lib.js?v=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMirror {
    host: String,
    mirror: Url,
}

impl HostMirror {
    pub fn new(host: impl Into<String>, mirror: Url) -> Self {
        Self {
            host: host.into(),
            mirror,
        }
    }
}

impl SpareResolver for HostMirror {
    fn resolve(&self, url: &Url) -> Option<Url> {
        if url.host_str() != Some(self.host.as_str()) {
            return None;
        }
        let mut spare = self.mirror.clone();
        let path = format!("{}{}", self.mirror.path().trim_end_matches('/'), url.path());
        spare.set_path(&path);
        spare.set_query(url.query());
        Some(spare)
    }
}

/// First mirror that resolves wins.
impl SpareResolver for Vec<HostMirror> {
    fn resolve(&self, url: &Url) -> Option<Url> {
        self.iter().find_map(|mirror| mirror.resolve(url))
    }
}
