//! Network access for cache misses and install-time seeding

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::{CachedResponse, ResourceRequest};
use crate::{HeatcastError, Result};

/// Trait for the network behind the gateway
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Perform the request.
    ///
    /// Non-success statuses are returned as responses; only transport
    /// failures are errors.
    async fn fetch(&self, request: &ResourceRequest) -> Result<CachedResponse>;
}

/// HTTP fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("heatcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HeatcastError::config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<CachedResponse> {
        let url = request.url().as_str();
        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| HeatcastError::network_fetch(url, None, Some(Box::new(e))))?;

        let response = self
            .client
            .request(method, request.url().clone())
            .send()
            .await
            .map_err(|e| HeatcastError::network_fetch(url, None, Some(Box::new(e))))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| HeatcastError::network_fetch(url, Some(status), Some(Box::new(e))))?;

        debug!(url, status, bytes = body.len(), "Fetched from network");
        Ok(CachedResponse { status, content_type, body })
    }
}
