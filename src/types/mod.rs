//! Core types shared by the subscription pipeline.
//!
//! - [`ConnectionStatus`] is the user-facing connection status, owned by the
//!   connection and read-only to every consumer
//! - [`Subscription`] pairs the single topic with the broker endpoint
//! - [`InboundMessage`] is a raw payload tagged with its topic
//! - [`UpdateRate`] controls how often image updates reach a renderer
//!
//! ```rust
//! use heatcast::types::{ConnectionStatus, InboundMessage, Subscription};
//!
//! let subscription = Subscription::new("image", "wss://broker.test:9002");
//! let message = InboundMessage::new("image", b"aGVsbG8=".to_vec());
//!
//! assert!(subscription.matches(&message));
//! assert!(!ConnectionStatus::Connecting.is_failure());
//! ```

mod message;
mod status;
mod update_rate;

pub use message::{InboundMessage, Subscription};
pub use status::ConnectionStatus;
pub use update_rate::UpdateRate;
