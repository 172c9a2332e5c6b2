//! Resource requests and cached responses

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{HeatcastError, Result};

/// An outbound resource request seen by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    method: String,
    url: Url,
}

impl ResourceRequest {
    /// Request with an explicit method
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url }
    }

    /// GET request for an absolute URL
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| HeatcastError::network_fetch(url, None, Some(Box::new(e))))?;
        Ok(Self::new("GET", url))
    }

    /// GET request for `path` resolved against `origin`
    pub fn resolve(origin: &Url, path: &str) -> Result<Self> {
        let url = origin
            .join(path)
            .map_err(|e| HeatcastError::config(format!("cannot resolve '{path}': {e}")))?;
        Ok(Self::new("GET", url))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Key the request is cached under.
    ///
    /// Only GET requests are cacheable. Fragments never reach the server and
    /// are ignored.
    pub fn cache_key(&self) -> Option<String> {
        if self.method != "GET" {
            return None;
        }
        let mut url = self.url.clone();
        url.set_fragment(None);
        Some(url.into())
    }
}

/// A response body with the metadata needed to replay it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { status, content_type: Some(content_type.into()), body: body.into() }
    }

    /// Status in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_paths_resolve_against_origin() {
        let origin = Url::parse("http://localhost:5173/app/").unwrap();
        let root = ResourceRequest::resolve(&origin, "/").unwrap();
        let icon = ResourceRequest::resolve(&origin, "/favicon.ico").unwrap();

        assert_eq!(root.url().as_str(), "http://localhost:5173/");
        assert_eq!(icon.url().as_str(), "http://localhost:5173/favicon.ico");
    }

    #[test]
    fn cache_key_ignores_fragment_and_non_get() {
        let request = ResourceRequest::get("http://localhost:5173/index.html#map").unwrap();
        assert_eq!(request.cache_key().as_deref(), Some("http://localhost:5173/index.html"));

        let post = ResourceRequest::new("post", request.url().clone());
        assert_eq!(post.method(), "POST");
        assert_eq!(post.cache_key(), None);
    }

    #[test]
    fn invalid_url_is_a_fetch_error() {
        let err = ResourceRequest::get("not a url").unwrap_err();
        assert!(matches!(err, HeatcastError::NetworkFetch { .. }));
    }
}
