//! HTTP transport backed by `reqwest`.

use crate::error::{ErrorKind, Result};
use crate::{CacheMode, FetchRequest, FetchResponse, Transport};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::debug;

/// HTTP(S) transport.
///
/// Redirects are followed by the underlying client, so the response URL may
/// differ from the request URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("swcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Setup)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.get(request.url.clone());
        if request.cache == CacheMode::NoStore {
            builder = builder.header(CACHE_CONTROL, "no-store").header(PRAGMA, "no-cache");
        }
        let response = builder
            .send()
            .await
            .or_raise(|| ErrorKind::Network(request.url.to_string()))?;
        let url = response.url().clone();
        let status = response.status().as_u16();
        // Non-UTF8 header values cannot be replayed faithfully, drop them.
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::Body(request.url.to_string()))?
            .to_vec();
        debug!(url = %request.url, status, bytes = body.len(), cache = ?request.cache, "Fetched");
        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
