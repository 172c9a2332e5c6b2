//! Client configuration
//!
//! Configuration is read from YAML. Every field has a default, so an empty
//! document yields a working client pointed at the public demo broker.
//!
//! ```rust
//! use heatcast::config::{Config, ReconnectPolicy};
//!
//! let config = Config::from_yaml_str(r#"
//! broker:
//!   url: mqtt://localhost:1883
//!   topic: heatmap/patras
//!   reconnect: !Backoff
//!     initial_ms: 500
//!     max_ms: 10000
//!     max_attempts: 5
//! cache:
//!   generation: v2
//!   origin: http://localhost:5173
//! "#).unwrap();
//!
//! assert_eq!(config.broker.topic, "heatmap/patras");
//! assert!(matches!(config.broker.reconnect, ReconnectPolicy::Backoff { .. }));
//! assert_eq!(config.cache.manifest.len(), 4);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{HeatcastError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub cache: CacheConfig,
    pub viewport: MapViewport,
    /// Default `tracing` filter; `RUST_LOG` takes precedence
    pub log_filter: Option<String>,
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// `mqtt://`, `mqtts://`, `ws://` or `wss://` endpoint
    pub url: String,
    /// The single topic to subscribe to
    pub topic: String,
    /// Client identifier; generated when absent
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub credentials: Option<Credentials>,
    pub reconnect: ReconnectPolicy,
    /// Media type of published images
    pub media_type: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "wss://labserver.sense-campus.gr:9002".to_string(),
            topic: "image".to_string(),
            client_id: None,
            keep_alive_secs: 60,
            credentials: None,
            reconnect: ReconnectPolicy::Never,
            media_type: crate::codec::DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

/// Username/password pair for the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// What to do after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconnectPolicy {
    /// Report the failure and stay down until the owner restarts
    #[default]
    Never,

    /// Bounded exponential backoff: `initial_ms`, doubled per attempt, capped at `max_ms`
    Backoff { initial_ms: u64, max_ms: u64, max_attempts: u32 },
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when no
    /// further attempt is allowed
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff { max_attempts, .. } if attempt == 0 || attempt > max_attempts => {
                None
            }
            ReconnectPolicy::Backoff { initial_ms, max_ms, .. } => {
                let factor = 1u64 << (attempt - 1).min(16);
                Some(Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms)))
            }
        }
    }
}

/// Offline cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache generation name; bumping it invalidates earlier installs
    pub generation: String,
    /// Base URL the manifest paths are resolved against
    pub origin: String,
    /// Resources seeded at install time
    pub manifest: Vec<String>,
    /// Directory for the durable store; in-memory when absent
    pub dir: Option<PathBuf>,
    /// Delete other generations on activation
    pub purge_stale_generations: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: "v1".to_string(),
            origin: "http://localhost:5173".to_string(),
            manifest: ["/", "/index.html", "/manifest.json", "/favicon.ico"]
                .into_iter()
                .map(String::from)
                .collect(),
            dir: None,
            purge_stale_generations: true,
        }
    }
}

/// Map viewport handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct MapViewport {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
    /// `[[south, west], [north, east]]` of the image overlay
    pub bounds: [[f64; 2]; 2],
    pub overlay_opacity: f32,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            center: [38.2466, 21.7346],
            zoom: 13,
            bounds: [[38.2, 21.68], [38.29, 21.79]],
            overlay_opacity: 0.6,
        }
    }
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            HeatcastError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.broker.endpoint()?;

        if self.broker.topic.is_empty() {
            return Err(HeatcastError::config("broker.topic must not be empty"));
        }
        if self.broker.topic.contains(['+', '#']) {
            return Err(HeatcastError::config("broker.topic must be a single topic, not a filter"));
        }
        if let ReconnectPolicy::Backoff { initial_ms, max_ms, .. } = self.broker.reconnect {
            if initial_ms == 0 || max_ms < initial_ms {
                return Err(HeatcastError::config(
                    "broker.reconnect requires 0 < initial_ms <= max_ms",
                ));
            }
        }

        if self.cache.generation.is_empty() {
            return Err(HeatcastError::config("cache.generation must not be empty"));
        }
        if self.cache.generation.contains(['/', '\\']) || self.cache.generation.starts_with('.') {
            return Err(HeatcastError::config("cache.generation must be a plain name"));
        }
        self.cache.origin_url()?;

        let [[south, west], [north, east]] = self.viewport.bounds;
        if south >= north || west >= east {
            return Err(HeatcastError::config("viewport.bounds must be [[south, west], [north, east]]"));
        }
        if !(0.0..=1.0).contains(&self.viewport.overlay_opacity) {
            return Err(HeatcastError::config("viewport.overlay_opacity must be within [0, 1]"));
        }

        Ok(())
    }
}

/// Wire transport selected by the broker URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Tls,
    Ws,
    Wss,
}

/// Parsed broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Full URL for websocket transports (path defaults to `/mqtt`)
    pub url: String,
}

impl BrokerConfig {
    /// Parse the broker URL
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| HeatcastError::config(format!("broker.url '{}': {}", self.url, e)))?;

        let (scheme, default_port) = match url.scheme() {
            "mqtt" | "tcp" => (Scheme::Tcp, 1883),
            "mqtts" | "ssl" => (Scheme::Tls, 8883),
            "ws" => (Scheme::Ws, 80),
            "wss" => (Scheme::Wss, 443),
            other => {
                return Err(HeatcastError::config(format!(
                    "broker.url scheme '{other}' is not supported"
                )));
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| HeatcastError::config("broker.url has no host"))?
            .to_string();
        let port = url.port().unwrap_or(default_port);

        if matches!(scheme, Scheme::Ws | Scheme::Wss) && matches!(url.path(), "" | "/") {
            url.set_path("/mqtt");
        }

        Ok(BrokerEndpoint { scheme, host, port, url: url.to_string() })
    }

    /// Client id; a random one is generated when not configured
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("heatcast_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl CacheConfig {
    /// Parsed origin URL
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| HeatcastError::config(format!("cache.origin '{}': {}", self.origin, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.broker.topic, "image");
        assert_eq!(config.cache.generation, "v1");
        assert_eq!(config.broker.reconnect, ReconnectPolicy::Never);
    }

    #[test]
    fn websocket_endpoint_gets_default_path() {
        let endpoint = BrokerConfig::default().endpoint().unwrap();
        assert_eq!(endpoint.scheme, Scheme::Wss);
        assert_eq!(endpoint.host, "labserver.sense-campus.gr");
        assert_eq!(endpoint.port, 9002);
        assert_eq!(endpoint.url, "wss://labserver.sense-campus.gr:9002/mqtt");
    }

    #[test]
    fn tcp_endpoint_default_port() {
        let broker = BrokerConfig { url: "mqtt://localhost".into(), ..Default::default() };
        let endpoint = broker.endpoint().unwrap();
        assert_eq!(endpoint.scheme, Scheme::Tcp);
        assert_eq!(endpoint.port, 1883);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "broker: { url: 'http://broker.test' }",
            "broker: { topic: '' }",
            "broker: { topic: 'image/#' }",
            "cache: { generation: '../v1' }",
            "viewport: { bounds: [[38.29, 21.79], [38.2, 21.68]] }",
            "viewport: { overlay_opacity: 1.5 }",
            "broker: { reconnect: !Backoff { initial_ms: 0, max_ms: 10, max_attempts: 1 } }",
        ];
        for yaml in cases {
            let err = Config::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, HeatcastError::Config { .. }), "{yaml} -> {err}");
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::Backoff { initial_ms: 100, max_ms: 1000, max_attempts: 6 };
        let delays: Vec<_> = (1..=7).map(|n| policy.delay_for(n)).collect();
        assert_eq!(delays[0], Some(Duration::from_millis(100)));
        assert_eq!(delays[1], Some(Duration::from_millis(200)));
        assert_eq!(delays[3], Some(Duration::from_millis(800)));
        assert_eq!(delays[4], Some(Duration::from_millis(1000)));
        assert_eq!(delays[6], None);
        assert_eq!(ReconnectPolicy::Never.delay_for(1), None);
    }

    #[test]
    fn generated_client_ids_are_unique() {
        let broker = BrokerConfig::default();
        let first = broker.client_id();
        let second = broker.client_id();
        assert!(first.starts_with("heatcast_"));
        assert_eq!(first.len(), "heatcast_".len() + 32);
        assert_ne!(first, second);

        let fixed = BrokerConfig { client_id: Some("overlay-1".into()), ..Default::default() };
        assert_eq!(fixed.client_id(), "overlay-1");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/heatcast.yaml").unwrap_err();
        assert!(matches!(err, HeatcastError::Config { .. }));
        assert!(err.to_string().contains("/nonexistent/heatcast.yaml"));
    }
}
