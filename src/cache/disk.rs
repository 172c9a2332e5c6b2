//! Durable cache store backed by a directory tree
//!
//! Layout: `<root>/<generation>/<hash>.body` holds the response body and
//! `<hash>.json` its metadata (key, status, content type). The metadata file
//! is written last, so an entry without one is incomplete and ignored.
//!
//! Every generation directory carries a marker file written by `open`. Only
//! marked directories are listed or deleted, so the root may be shared with
//! unrelated data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{CacheStore, CachedResponse};
use crate::{HeatcastError, Result};

/// Marker file identifying a directory as a cache generation
const GENERATION_MARKER: &str = ".heatcast-generation";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    #[serde(flatten)]
    response: CachedResponse,
}

/// Cache store persisting generations under a root directory
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    /// Use `root` as the cache directory; it is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> Result<PathBuf> {
        let plain = !generation.is_empty()
            && !generation.starts_with('.')
            && !generation.contains(['/', '\\']);
        if !plain {
            return Err(HeatcastError::config(format!("invalid cache generation '{generation}'")));
        }
        Ok(self.root.join(generation))
    }

    /// Stable file stem for a key (BLAKE3, hex)
    fn entry_stem(key: &str) -> String {
        blake3::hash(key.as_bytes()).to_hex().to_string()
    }

    async fn is_generation(dir: &Path) -> Result<bool> {
        let marker = dir.join(GENERATION_MARKER);
        fs::try_exists(&marker).await.map_err(|e| HeatcastError::storage(&marker, e))
    }

    async fn write_file(path: PathBuf, contents: &[u8]) -> Result<PathBuf> {
        fs::write(&path, contents).await.map_err(|e| HeatcastError::storage(&path, e))?;
        Ok(path)
    }

    fn encode_meta(path: &Path, key: &str, response: &CachedResponse) -> Result<Vec<u8>> {
        let meta = EntryMeta { key: key.to_string(), response: response.clone() };
        serde_json::to_vec(&meta).map_err(|e| {
            HeatcastError::storage(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Write bodies first, then metadata, recording each stem touched
    async fn write_batch(
        dir: &Path,
        entries: &[(String, CachedResponse)],
        touched: &mut Vec<String>,
    ) -> Result<()> {
        for (key, response) in entries {
            let stem = Self::entry_stem(key);
            touched.push(stem.clone());
            Self::write_file(dir.join(format!("{stem}.body")), &response.body).await?;
        }
        for (key, response) in entries {
            let meta_path = dir.join(format!("{}.json", Self::entry_stem(key)));
            let encoded = Self::encode_meta(&meta_path, key, response)?;
            Self::write_file(meta_path, &encoded).await?;
        }
        Ok(())
    }

    async fn read_meta(path: &Path) -> Result<EntryMeta> {
        let raw = fs::read(path).await.map_err(|e| HeatcastError::storage(path, e))?;
        serde_json::from_slice(&raw).map_err(|e| {
            HeatcastError::storage(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

#[async_trait::async_trait]
impl CacheStore for DiskCacheStore {
    async fn open(&self, generation: &str) -> Result<()> {
        let dir = self.generation_dir(generation)?;
        fs::create_dir_all(&dir).await.map_err(|e| HeatcastError::storage(&dir, e))?;
        if !Self::is_generation(&dir).await? {
            Self::write_file(dir.join(GENERATION_MARKER), generation.as_bytes()).await?;
        }
        Ok(())
    }

    async fn put(&self, generation: &str, key: &str, response: &CachedResponse) -> Result<()> {
        self.open(generation).await?;
        let dir = self.generation_dir(generation)?;
        let stem = Self::entry_stem(key);

        Self::write_file(dir.join(format!("{stem}.body")), &response.body).await?;
        let meta_path = dir.join(format!("{stem}.json"));
        let encoded = Self::encode_meta(&meta_path, key, response)?;
        Self::write_file(meta_path, &encoded).await?;

        debug!(generation, key, "Stored cache entry on disk");
        Ok(())
    }

    /// Store all entries or none of them.
    ///
    /// On a failed write every entry of the batch is removed again, including
    /// entries it replaced.
    async fn put_all(&self, generation: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
        self.open(generation).await?;
        let dir = self.generation_dir(generation)?;

        let mut touched = Vec::with_capacity(entries.len());
        if let Err(e) = Self::write_batch(&dir, entries, &mut touched).await {
            warn!(generation, entries = touched.len(), "Batch write failed, rolling back: {}", e);
            for stem in &touched {
                for ext in ["json", "body"] {
                    let _ = fs::remove_file(dir.join(format!("{stem}.{ext}"))).await;
                }
            }
            return Err(e);
        }

        debug!(generation, entries = entries.len(), "Stored cache batch on disk");
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &str) -> Result<Option<CachedResponse>> {
        let dir = self.generation_dir(generation)?;
        let stem = Self::entry_stem(key);
        let meta_path = dir.join(format!("{stem}.json"));

        if !fs::try_exists(&meta_path).await.map_err(|e| HeatcastError::storage(&meta_path, e))? {
            return Ok(None);
        }

        let meta = Self::read_meta(&meta_path).await?;
        if meta.key != key {
            warn!(key, stored = %meta.key, "Cache entry belongs to another key");
            return Ok(None);
        }

        let body_path = dir.join(format!("{stem}.body"));
        let body = fs::read(&body_path).await.map_err(|e| HeatcastError::storage(&body_path, e))?;

        Ok(Some(CachedResponse { body: body.into(), ..meta.response }))
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>> {
        let dir = self.generation_dir(generation)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HeatcastError::storage(&dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| HeatcastError::storage(&dir, e))? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && path.extension().and_then(|s| s.to_str()) == Some("json") {
                keys.push(Self::read_meta(&path).await?.key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn generations(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HeatcastError::storage(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| HeatcastError::storage(&self.root, e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || !Self::is_generation(&entry.path()).await? {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool> {
        let dir = self.generation_dir(generation)?;
        if !Self::is_generation(&dir).await? {
            debug!(generation, "Not a cache generation, leaving it alone");
            return Ok(false);
        }
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(HeatcastError::storage(&dir, e)),
        }
    }
}
