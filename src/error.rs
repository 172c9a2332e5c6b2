//! Error types for the heatcast client.
//!
//! Every fallible operation in the crate returns [`HeatcastError`]. The
//! variants follow the failure kinds of the pipeline:
//!
//! - **Connection Errors**: the broker handshake or the transport failed
//! - **Subscribe Errors**: the broker refused the topic subscription
//! - **Decode Errors**: a payload is not valid base64 (only reported by
//!   explicit inspection, the live pipeline renders it as a broken frame)
//! - **Cache Errors**: install-time seeding or the durable store failed
//! - **Network Errors**: a non-cached resource could not be fetched
//! - **Config Errors**: the configuration file is missing or invalid
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use heatcast::HeatcastError;
//!
//! let error = HeatcastError::connection_failed("broker unreachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for heatcast operations.
pub type Result<T, E = HeatcastError> = std::result::Result<T, E>;

/// Boxed source error carried by transport and network failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for heatcast operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HeatcastError {
    #[error("Failed to connect to broker: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Subscription to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Payload decode error: {details}")]
    Decode { details: String },

    #[error("Cache generation '{generation}' could not be seeded with '{resource}'")]
    CacheSeed {
        generation: String,
        resource: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Network fetch of {url} failed{}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    NetworkFetch {
        url: String,
        status: Option<u16>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Cache storage error: {path}")]
    CacheStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl HeatcastError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            HeatcastError::Connection { .. } => true,
            HeatcastError::Subscribe { .. } => true,
            HeatcastError::NetworkFetch { .. } => true,
            HeatcastError::CacheSeed { .. } => true,
            HeatcastError::Decode { .. } => false,
            HeatcastError::CacheStorage { .. } => false,
            HeatcastError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            HeatcastError::Connection { .. } => vec![
                "Check the broker URL and port",
                "Verify the broker accepts websocket connections",
                "Reload the client to retry the connection",
            ],
            HeatcastError::Subscribe { .. } => vec![
                "Check the topic name",
                "Verify the broker ACL allows subscribing to the topic",
            ],
            HeatcastError::Decode { .. } => vec![
                "Verify the publisher sends base64-encoded images",
                "Wait for the next frame",
            ],
            HeatcastError::CacheSeed { .. } => vec![
                "Check that every manifest resource is served by the origin",
                "Retry the install once the network is available",
            ],
            HeatcastError::NetworkFetch { .. } => vec![
                "Check network connectivity",
                "Add the resource to the cache manifest for offline use",
            ],
            HeatcastError::CacheStorage { .. } => vec![
                "Check cache directory permissions",
                "Ensure sufficient disk space",
            ],
            HeatcastError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Compare against the documented defaults",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        HeatcastError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(reason: impl Into<String>, source: BoxError) -> Self {
        HeatcastError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for subscription errors.
    pub fn subscribe_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        HeatcastError::Subscribe { topic: topic.into(), reason: reason.into() }
    }

    /// Helper constructor for network fetch errors.
    pub fn network_fetch(url: impl Into<String>, status: Option<u16>, source: Option<BoxError>) -> Self {
        HeatcastError::NetworkFetch { url: url.into(), status, source }
    }

    /// Helper constructor for cache seeding errors.
    pub fn cache_seed(
        generation: impl Into<String>,
        resource: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        HeatcastError::CacheSeed { generation: generation.into(), resource: resource.into(), source }
    }

    /// Helper constructor for cache storage errors with path context.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeatcastError::CacheStorage { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        HeatcastError::Config { reason: reason.into() }
    }
}

impl From<serde_yaml_ng::Error> for HeatcastError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        HeatcastError::Config { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            topic in "[a-z/]{1,16}",
            url in "https://[a-z]{1,8}\\.test/[a-z]{0,8}",
            status in 100u16..600u16
          ) {
            let connection = HeatcastError::connection_failed(reason.clone());
            prop_assert!(connection.to_string().contains(&reason));

            let subscribe = HeatcastError::subscribe_failed(topic.clone(), reason.clone());
            prop_assert!(subscribe.to_string().contains(&topic));

            let fetch = HeatcastError::network_fetch(url.clone(), Some(status), None);
            let message = fetch.to_string();
            prop_assert!(message.contains(&url));
            prop_assert!(message.contains(&status.to_string()));
          }
        }
    }

    #[test]
    fn network_fetch_without_status_omits_it() {
        let err = HeatcastError::network_fetch("https://origin.test/app.js", None, None);
        assert_eq!(err.to_string(), "Network fetch of https://origin.test/app.js failed");
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<HeatcastError>();

        let error = HeatcastError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let connection_error = HeatcastError::connection_failed("test");
        let decode_error = HeatcastError::Decode { details: "bad padding".into() };
        let config_error = HeatcastError::config("missing topic");

        assert!(connection_error.is_retryable());
        assert!(!decode_error.is_retryable());
        assert!(!config_error.is_retryable());

        for suggestion in connection_error.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
        assert!(!decode_error.recovery_suggestions().is_empty());
    }

    #[test]
    fn storage_errors_keep_their_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match HeatcastError::storage("/var/cache/heatcast/v1", io_err) {
            HeatcastError::CacheStorage { path, source } => {
                assert_eq!(path, PathBuf::from("/var/cache/heatcast/v1"));
                assert_eq!(source.to_string(), "gone");
            }
            other => panic!("Expected CacheStorage, got {other:?}"),
        }
    }

    #[test]
    fn from_conversions_work() {
        let yaml_err = serde_yaml_ng::from_str::<u32>("[").unwrap_err();
        assert!(matches!(HeatcastError::from(yaml_err), HeatcastError::Config { .. }));
    }
}
