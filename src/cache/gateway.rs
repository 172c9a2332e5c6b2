//! Offline gateway: install-time seeding and request interception

use futures::future::try_join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    CacheStore, CachedResponse, DiskCacheStore, Fetcher, HttpFetcher, MemoryCacheStore,
    ResourceRequest,
};
use crate::config::CacheConfig;
use crate::{HeatcastError, Result};

/// Per-request timeout of the default HTTP fetcher
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    /// Cache keys that were stored
    pub cached: Vec<String>,
}

/// Hit/miss counters of the interception path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewayStats {
    pub hits: u64,
    pub misses: u64,
}

/// Serves resource requests from a cache generation, falling back to the network
pub struct OfflineGateway {
    generation: String,
    manifest: Vec<ResourceRequest>,
    purge_stale_generations: bool,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl OfflineGateway {
    /// Create a gateway over an explicit store and network
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let origin = config.origin_url()?;
        let manifest = config
            .manifest
            .iter()
            .map(|path| ResourceRequest::resolve(&origin, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            generation: config.generation.clone(),
            manifest,
            purge_stale_generations: config.purge_stale_generations,
            store,
            fetcher,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Gateway with the HTTP fetcher and the store selected by `config.dir`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match &config.dir {
            Some(dir) => Arc::new(DiskCacheStore::new(dir)),
            None => Arc::new(MemoryCacheStore::new()),
        };
        Self::new(config, store, Arc::new(HttpFetcher::new(FETCH_TIMEOUT)?))
    }

    /// Current cache generation name
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Requests seeded at install
    pub fn manifest(&self) -> &[ResourceRequest] {
        &self.manifest
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed) }
    }

    /// Install hook: seed the current generation with the manifest.
    ///
    /// All manifest resources are fetched before anything is stored. If any
    /// fetch fails or returns a non-success status, nothing is stored and
    /// the install fails with [`HeatcastError::CacheSeed`].
    pub async fn on_install(&self) -> Result<InstallReport> {
        info!("Installing cache generation '{}' ({} resources)", self.generation, self.manifest.len());
        self.store.open(&self.generation).await?;

        let fetches = self.manifest.iter().map(|request| async move {
            let resource = request.url().to_string();
            let key = request.cache_key().ok_or_else(|| {
                HeatcastError::cache_seed(&self.generation, &resource, Some("not cacheable".into()))
            })?;

            let response = self
                .fetcher
                .fetch(request)
                .await
                .map_err(|e| HeatcastError::cache_seed(&self.generation, &resource, Some(Box::new(e))))?;

            if !response.is_success() {
                let status = response.status;
                return Err(HeatcastError::cache_seed(
                    &self.generation,
                    &resource,
                    Some(format!("status {status}").into()),
                ));
            }

            Ok::<_, HeatcastError>((key, response))
        });

        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Install of '{}' failed: {}", self.generation, e);
                return Err(e);
            }
        };

        self.store.put_all(&self.generation, &entries).await.map_err(|e| {
            HeatcastError::cache_seed(&self.generation, "<store>", Some(Box::new(e)))
        })?;

        let cached: Vec<String> = entries.into_iter().map(|(key, _)| key).collect();
        info!("Cache generation '{}' seeded with {} entries", self.generation, cached.len());
        Ok(InstallReport { generation: self.generation.clone(), cached })
    }

    /// Activation hook: delete every generation other than the current one.
    ///
    /// Returns the names of deleted generations. Does nothing when purging
    /// is disabled. Fails with [`HeatcastError::CacheSeed`] and deletes
    /// nothing unless every manifest entry is stored in the current
    /// generation, so a failed install never costs the previous cache.
    pub async fn on_activate(&self) -> Result<Vec<String>> {
        let stored = self.store.keys(&self.generation).await?;
        if let Some(missing) = self
            .manifest
            .iter()
            .filter_map(ResourceRequest::cache_key)
            .find(|key| stored.binary_search(key).is_err())
        {
            warn!("Cache generation '{}' is not installed, keeping older generations", self.generation);
            return Err(HeatcastError::cache_seed(
                &self.generation,
                missing,
                Some("generation not installed".into()),
            ));
        }

        if !self.purge_stale_generations {
            debug!("Stale generation purge disabled");
            return Ok(Vec::new());
        }

        let mut purged = Vec::new();
        for generation in self.store.generations().await? {
            if generation != self.generation && self.store.delete_generation(&generation).await? {
                info!("Deleted stale cache generation '{}'", generation);
                purged.push(generation);
            }
        }
        Ok(purged)
    }

    /// Fetch hook: serve from the cache, or from the network on a miss.
    ///
    /// Network responses are passed through without being cached. A network
    /// failure on a miss propagates as [`HeatcastError::NetworkFetch`].
    pub async fn on_fetch(&self, request: &ResourceRequest) -> Result<CachedResponse> {
        if let Some(key) = request.cache_key() {
            match self.store.lookup(&self.generation, &key).await {
                Ok(Some(response)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Cache hit");
                    return Ok(response);
                }
                Ok(None) => debug!(key = %key, "Cache miss"),
                Err(e) => warn!(key = %key, "Cache lookup failed, using network: {}", e),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.fetcher.fetch(request).await
    }
}
