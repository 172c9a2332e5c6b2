//! Real-time heatmap overlay client for an MQTT image feed.
//!
//! Heatcast subscribes to a single broker topic carrying base64-encoded
//! heatmap images, turns every payload into a renderable data URI and exposes
//! the connection status and the latest image as streams for a map overlay.
//! An offline cache gateway keeps the hosting shell's static resources
//! available without a network.
//!
//! # Features
//!
//! - **Live feed**: MQTT over TCP, TLS, WebSocket or secure WebSocket
//! - **Last write wins**: slow renderers always see the newest image
//! - **Explicit lifecycle**: one connection, activated once, torn down once
//! - **Offline shell**: install-time seeding and cache-first request handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use heatcast::{Config, Heatcast, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> heatcast::Result<()> {
//!     let config = Config::default();
//!     let mut connection = Heatcast::connect(&config).await?;
//!
//!     let mut view = Box::pin(connection.view_updates(UpdateRate::Max(10)));
//!     while let Some(state) = view.next().await {
//!         println!("{} | {}", state.status_text, state.image_status_text);
//!     }
//!
//!     connection.teardown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
pub mod config;
mod error;
pub mod lifecycle;
pub mod logging;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod view;

// Connection pipeline
pub mod connection;
pub mod driver;
pub mod stream;
pub mod transport;
pub mod transports;

// Offline shell
pub mod cache;

// Core exports
pub use codec::{ImageResource, PayloadCodec};
pub use config::Config;
pub use error::*;
pub use types::*;

// Main API exports
pub use cache::OfflineGateway;
pub use connection::LiveConnection;
pub use view::{ViewSnapshot, ViewState};

/// Unified entry point for the heatmap client.
///
/// # Examples
///
/// ## Live feed
/// ```rust,no_run
/// use heatcast::{Config, Heatcast};
///
/// #[tokio::main]
/// async fn main() -> heatcast::Result<()> {
///     let mut connection = Heatcast::connect(&Config::default()).await?;
///     // Use connection...
///     connection.teardown().await;
///     Ok(())
/// }
/// ```
///
/// ## Offline shell
/// ```rust,no_run
/// use heatcast::{Config, Heatcast};
///
/// #[tokio::main]
/// async fn main() -> heatcast::Result<()> {
///     let gateway = Heatcast::gateway(&Config::default())?;
///     gateway.on_install().await?;
///     gateway.on_activate().await?;
///     Ok(())
/// }
/// ```
pub struct Heatcast;

impl Heatcast {
    /// Connect to the configured broker and subscribe to the image topic.
    ///
    /// Returns as soon as the lifecycle task is running; the handshake
    /// continues in the background and its outcome is reported through
    /// [`LiveConnection::status_updates`]. Must be called within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the broker URL
    /// cannot be parsed. Network failures are never returned here.
    pub async fn connect(config: &Config) -> Result<LiveConnection> {
        config.validate()?;
        let mut connection = LiveConnection::from_config(&config.broker)?;
        connection.activate();
        Ok(connection)
    }

    /// Build the offline gateway for the configured cache generation.
    ///
    /// The gateway uses a disk store when `cache.dir` is set and an
    /// in-memory store otherwise.
    pub fn gateway(config: &Config) -> Result<OfflineGateway> {
        config.validate()?;
        OfflineGateway::from_config(&config.cache)
    }
}
