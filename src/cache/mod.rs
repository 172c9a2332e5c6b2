//! Offline cache gateway.
//!
//! The gateway reacts to two lifecycle hooks of the hosting shell:
//!
//! - [`OfflineGateway::on_install`] seeds a named cache generation with a
//!   fixed manifest of static resources and only returns once every entry is
//!   stored, so the shell is offline-capable right after install
//! - [`OfflineGateway::on_fetch`] answers a resource request from the cache
//!   when possible and falls back to the network otherwise, without storing
//!   the network response
//!
//! [`OfflineGateway::on_activate`] additionally removes generations other
//! than the current one.
//!
//! ```rust,no_run
//! use heatcast::cache::{OfflineGateway, ResourceRequest};
//! use heatcast::config::CacheConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> heatcast::Result<()> {
//! let gateway = OfflineGateway::from_config(&CacheConfig::default())?;
//! gateway.on_install().await?;
//! gateway.on_activate().await?;
//!
//! let request = ResourceRequest::get("http://localhost:5173/index.html")?;
//! let response = gateway.on_fetch(&request).await?;
//! println!("{} bytes", response.body.len());
//! # Ok(())
//! # }
//! ```

mod disk;
mod fetch;
mod gateway;
mod request;
mod store;

pub use disk::DiskCacheStore;
pub use fetch::{Fetcher, HttpFetcher};
pub use gateway::{GatewayStats, InstallReport, OfflineGateway};
pub use request::{CachedResponse, ResourceRequest};
pub use store::{CacheStore, MemoryCacheStore};
