//! Offline shell tests through the public API
//!
//! Runs install, activation and interception against a disk store and an
//! in-process network that can be switched off.

use async_trait::async_trait;
use heatcast::cache::{CacheStore, CachedResponse, DiskCacheStore, Fetcher, OfflineGateway, ResourceRequest};
use heatcast::{Config, HeatcastError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct ToggleNetwork {
    offline: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for ToggleNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> heatcast::Result<CachedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(HeatcastError::network_fetch(request.url().as_str(), None, None));
        }
        Ok(CachedResponse::new(200, "text/html", format!("served {}", request.url().path())))
    }
}

fn config(dir: &std::path::Path) -> Config {
    let yaml = format!(
        r#"
cache:
  generation: v2
  origin: http://shell.test
  dir: {}
"#,
        dir.display()
    );
    Config::from_yaml_str(&yaml).unwrap()
}

#[tokio::test]
async fn shell_survives_going_offline() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let store = Arc::new(DiskCacheStore::new(dir.path()));
    store.put("v1", "http://shell.test/", &CachedResponse::new(200, "text/html", "old shell")).await.unwrap();

    let network = Arc::new(ToggleNetwork::default());
    let gateway = OfflineGateway::new(&config.cache, store.clone(), network.clone()).unwrap();

    let report = gateway.on_install().await.unwrap();
    assert_eq!(report.generation, "v2");
    assert_eq!(report.cached.len(), 4);
    assert_eq!(gateway.on_activate().await.unwrap(), vec!["v1"]);

    network.offline.store(true, Ordering::SeqCst);
    let calls_before = network.calls.load(Ordering::SeqCst);

    let shell = ResourceRequest::get("http://shell.test/index.html").unwrap();
    let response = gateway.on_fetch(&shell).await.unwrap();
    assert_eq!(response.body.as_ref(), b"served /index.html");
    assert_eq!(network.calls.load(Ordering::SeqCst), calls_before);

    let live = ResourceRequest::get("http://shell.test/api/live").unwrap();
    let err = gateway.on_fetch(&live).await.unwrap_err();
    assert!(matches!(err, HeatcastError::NetworkFetch { .. }));
}

#[tokio::test]
async fn gateway_from_config_uses_disk_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let gateway = heatcast::Heatcast::gateway(&config).unwrap();
    assert_eq!(gateway.generation(), "v2");
    assert_eq!(gateway.manifest().len(), 4);
    assert_eq!(gateway.manifest()[1].url().as_str(), "http://shell.test/index.html");
}
