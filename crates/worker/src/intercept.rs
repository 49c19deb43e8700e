//! Serving intercepted requests.

use crate::error::{ErrorKind, Result};
use crate::spare::SpareResolver;
use exn::ResultExt;
use std::sync::Arc;
use swcache_core::{RuleTable, cache_key};
use swcache_fetch::{CacheMode, FetchRequest, FetchResponse, TransportHandle};
use swcache_store::{StoreHandle, StoredResponse};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};
use url::Url;

/// How an intercepted request was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not handled; the request goes out untouched.
    Passthrough,
    /// Served from the cache without touching the network.
    Cached(StoredResponse),
    /// Cacheable but not cached yet: fetched bypassing intermediate caches.
    Network(FetchResponse),
    /// Not cacheable; fetched from a spare origin instead.
    Spare(FetchResponse),
}

/// Answers requests from the cache where the [`RuleTable`] allows it.
///
/// Successful network responses are written to the store by detached
/// background tasks: a response is never held back waiting for its cache
/// write, and a failed write is only logged. Call [`settle`](Self::settle)
/// to wait for pending writes.
#[derive(Clone)]
pub struct Interceptor {
    store: StoreHandle,
    transport: TransportHandle,
    rules: Arc<RuleTable>,
    spare: Option<Arc<dyn SpareResolver>>,
    writes: TaskTracker,
    /// Held for the whole close/wait/reopen cycle of [`settle`](Self::settle).
    settling: Arc<Mutex<()>>,
}

impl Interceptor {
    pub fn new(store: StoreHandle, transport: TransportHandle, rules: Arc<RuleTable>) -> Self {
        Self {
            store,
            transport,
            rules,
            spare: None,
            writes: TaskTracker::new(),
            settling: Arc::default(),
        }
    }

    pub fn with_spare(mut self, spare: impl SpareResolver + 'static) -> Self {
        self.spare = Some(Arc::new(spare));
        self
    }

    /// Intercept a request for `url`. Only `GET` requests are handled.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn intercept(&self, method: &str, url: &Url) -> Result<Interception> {
        if method != "GET" {
            return Ok(Interception::Passthrough);
        }
        let Some(rule) = self.rules.find(url) else {
            return self.fetch_spare(url).await;
        };

        let key = cache_key(url);
        if let Some(cached) = self.store.get(&key).await.or_raise(|| ErrorKind::Store)? {
            debug!(key, rule = rule.name(), "Cache hit");
            return Ok(Interception::Cached(cached));
        }

        let request = FetchRequest::new(url.clone()).with_cache(CacheMode::NoStore);
        let response = self.transport.fetch(&request).await.or_raise(|| ErrorKind::Transport)?;
        if response.status == 200 {
            self.store_detached(key, &response);
        }
        Ok(Interception::Network(response))
    }

    /// Wait until every background cache write started so far has finished.
    ///
    /// Concurrent callers (clones included) settle one after another.
    pub async fn settle(&self) {
        let _guard = self.settling.lock().await;
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    async fn fetch_spare(&self, url: &Url) -> Result<Interception> {
        let Some(spare) = self.spare.as_ref().and_then(|spare| spare.resolve(url)) else {
            return Ok(Interception::Passthrough);
        };
        debug!(%spare, "Fetching from spare origin");
        let response = self
            .transport
            .fetch(&FetchRequest::new(spare))
            .await
            .or_raise(|| ErrorKind::Transport)?;
        Ok(Interception::Spare(response))
    }

    fn store_detached(&self, key: String, response: &FetchResponse) {
        let store = Arc::clone(&self.store);
        let stored = StoredResponse::new(response.status, response.headers.clone(), response.body.clone());
        self.writes.spawn(async move {
            match store.put(&key, stored).await {
                Ok(()) => debug!(key, "Stored response"),
                Err(err) => warn!(key, error = ?err, retryable = err.is_retryable(), "Failed to store response"),
            }
        });
    }
}
