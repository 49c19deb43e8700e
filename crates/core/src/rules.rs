//! Cacheability rules.
//!
//! The rule table decides which requests are cached at all. Rules are tried
//! in declaration order and the first match wins; a URL no rule matches is
//! not cacheable. Each rule also declares whether its entries are evicted by
//! a site-wide clean (an `all` expression).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::Regex;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use url::Url;

/// Document served for a directory URL (`/blog/` is `/blog/index.html`).
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Normalize a URL to the key its response is cached under: scheme, host,
/// port and path. Credentials, query string and fragment are dropped.
///
/// ```
/// use url::Url;
/// use swcache_core::cache_key;
///
/// let url = Url::parse("https://example.com:8443/style/a.css?v=3#top").unwrap();
/// assert_eq!(cache_key(&url), "https://example.com:8443/style/a.css");
/// ```
pub fn cache_key(url: &Url) -> String {
    let mut key = url.clone();
    // Only fails for URLs that cannot carry credentials in the first place.
    _ = key.set_username("");
    _ = key.set_password(None);
    key.set_query(None);
    key.set_fragment(None);
    key.into()
}

/// A single cacheability rule.
pub trait CacheRule: Send + Sync {
    /// Name of the rule (for logging only).
    fn name(&self) -> &str;

    /// Whether requests for `url` are cached under this rule.
    fn matches(&self, url: &Url) -> bool;

    /// Whether entries cached under this rule are evicted by a site-wide
    /// clean. Rules for resources that never change between deploys (fonts,
    /// third-party libraries pinned by version) return `false`.
    fn clean(&self) -> bool;
}

/// Rule matching an optional exact host and a regular expression on the
/// URL path.
pub struct PatternRule {
    name: String,
    host: Option<String>,
    path: Regex,
    clean: bool,
}

impl PatternRule {
    /// Create a rule with `clean = true` that applies to any host.
    pub fn new(name: impl Into<String>, path_pattern: &str) -> Result<Self> {
        let path = Regex::new(path_pattern).or_raise(|| ErrorKind::InvalidPattern(path_pattern.to_string()))?;
        Ok(Self {
            name: name.into(),
            host: None,
            path,
            clean: true,
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

impl CacheRule for PatternRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, url: &Url) -> bool {
        if let Some(host) = &self.host
            && url.host_str() != Some(host.as_str())
        {
            return false;
        }
        self.path.is_match(url.path())
    }

    fn clean(&self) -> bool {
        self.clean
    }
}

impl Debug for PatternRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PatternRule")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("path", &self.path.as_str())
            .field("clean", &self.clean)
            .finish()
    }
}

/// Ordered list of cacheability rules.
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: Vec<Arc<dyn CacheRule>>,
}

impl RuleTable {
    pub fn with_rule(mut self, rule: impl CacheRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `url`, in declaration order.
    ///
    /// Requests to `localhost` are never cacheable, so local development
    /// always sees fresh files.
    pub fn find(&self, url: &Url) -> Option<&dyn CacheRule> {
        if url.host_str() == Some("localhost") {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(url)).map(|rule| rule.as_ref())
    }

    /// Whether a site-wide clean evicts the entry stored under `key`: it is
    /// either not covered by any rule, or covered by a rule marked `clean`.
    pub fn is_cleanable(&self, key: &str) -> bool {
        let Ok(url) = Url::parse(key) else {
            // Not a URL, so no rule can claim it.
            return true;
        };
        self.find(&url).is_none_or(|rule| rule.clean())
    }
}

impl Debug for RuleTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.rules.iter().map(|rule| rule.name())).finish()
    }
}
