//! Network transport.
//!
//! Fetching resources and the update manifest goes through the [`Transport`]
//! trait so that the cache logic never talks to an HTTP client directly.

pub mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod models;

pub use crate::http::HttpTransport;
#[cfg(feature = "mock")]
pub use crate::mock::MockTransport;
pub use crate::models::{CacheMode, FetchRequest, FetchResponse};
use async_trait::async_trait;
use std::sync::Arc;

pub type TransportHandle = Arc<dyn Transport + Send + Sync>;

/// Something that can turn a [`FetchRequest`] into a [`FetchResponse`].
///
/// A response with a non-success status is still a successful fetch; only
/// failures to obtain a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> error::Result<FetchResponse>;
}
