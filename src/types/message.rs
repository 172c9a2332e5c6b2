//! Subscription and inbound message types

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The single (topic, broker endpoint) pair of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Subscription {
    /// Topic the client subscribes to
    pub topic: String,

    /// Broker endpoint URL
    pub endpoint: String,
}

impl Subscription {
    /// Create a new subscription
    pub fn new(topic: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self { topic: topic.into(), endpoint: endpoint.into() }
    }

    /// Whether the message was published on this subscription's topic
    pub fn matches(&self, message: &InboundMessage) -> bool {
        message.topic == self.topic
    }
}

/// Raw transport payload tagged with its topic.
///
/// Consumed immediately by the payload codec and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,

    /// Message body (zero-copy via Bytes)
    pub payload: Bytes,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }
}
