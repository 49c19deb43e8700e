//! Request and response models.

use url::Url;

/// How a fetch interacts with intermediate HTTP caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Let intermediate caches answer as they normally would.
    #[default]
    Default,
    /// Bypass intermediate caches and go to the origin.
    NoStore,
}

/// A GET request for a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub cache: CacheMode,
}
impl FetchRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            cache: CacheMode::Default,
        }
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL (after redirects, if the transport follows them)
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
impl FetchResponse {
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Status is in the `2xx` range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status is `2xx` or one of the redirects a manifest may legitimately
    /// be served through (301, 302, 307).
    pub fn is_acceptable(&self) -> bool {
        self.is_ok() || matches!(self.status, 301 | 302 | 307)
    }
}
