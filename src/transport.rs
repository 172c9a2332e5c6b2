//! Transport trait for broker connections

use crate::Result;
use crate::types::InboundMessage;

/// Events reported by an open transport
#[derive(Debug)]
pub enum TransportEvent {
    /// Broker answered a subscribe request
    SubscribeAck {
        /// Whether every requested topic was granted
        granted: bool,
    },

    /// A message was published on a subscribed topic
    Message(InboundMessage),

    /// Transport-level failure; the transport is unusable afterwards
    Failed(crate::HeatcastError),
}

/// Trait for broker transports
///
/// A transport owns exactly one broker connection at a time. The
/// [`Driver`](crate::driver::Driver) is its only user, so implementations do
/// not need interior synchronisation.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Perform the handshake
    ///
    /// Returns once the broker accepted the connection. May be called again
    /// after [`close`](Transport::close) to start a fresh connection.
    async fn connect(&mut self) -> Result<()>;

    /// Send a subscribe request for `topic`
    ///
    /// The acknowledgment arrives later through [`next_event`](Transport::next_event).
    /// An error here means the request could not be queued.
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Wait for the next event
    ///
    /// Must be cancel-safe: the driver races it against teardown.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the transport
    ///
    /// Closing an already closed transport is a no-op.
    async fn close(&mut self);
}

#[async_trait::async_trait]
impl Transport for Box<dyn Transport> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        (**self).subscribe(topic).await
    }

    async fn next_event(&mut self) -> TransportEvent {
        (**self).next_event().await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
