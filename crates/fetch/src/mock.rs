//! In-memory transport for testing.

use crate::error::{ErrorKind, Result};
use crate::{FetchRequest, FetchResponse, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

/// Transport serving canned responses.
///
/// Responses are keyed by the full request URL (including query). Every
/// request is recorded, so tests can assert what went over the "network"
/// and with which [`CacheMode`](crate::CacheMode).
#[derive(Default)]
pub struct MockTransport {
    responses: RwLock<HashMap<String, (u16, Vec<u8>)>>,
    requests: RwLock<Vec<FetchRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the response for a URL.
    pub async fn respond(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.responses.write().await.insert(url.to_string(), (status, body.into()));
    }

    /// Every request seen so far, in order.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.read().await.clone()
    }

    /// Requests seen so far for one URL.
    pub async fn requests_for(&self, url: &str) -> usize {
        self.requests.read().await.iter().filter(|r| r.url.as_str() == url).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.requests.write().await.push(request.clone());
        let guard = self.responses.read().await;
        let Some((status, body)) = guard.get(request.url.as_str()) else {
            exn::bail!(ErrorKind::Unregistered(request.url.to_string()));
        };
        Ok(FetchResponse::new(Url::clone(&request.url), *status, body.clone()))
    }
}
