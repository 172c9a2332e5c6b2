//! User-facing connection status

use serde::{Deserialize, Serialize};

/// Connection status published by a [`LiveConnection`](crate::LiveConnection).
///
/// Exactly one value is current at any time. Consumers only ever observe it
/// through watch receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionStatus {
    /// Handshake with the broker in progress
    Connecting,

    /// Handshake done, subscription requested or confirmed
    Connected,

    /// Broker refused the subscription; the transport stays open
    SubscriptionFailed,

    /// Transport-level failure; the transport has been closed
    ConnectionFailed,

    /// Torn down by the owner
    Disconnected,
}

impl ConnectionStatus {
    /// All status values, in lifecycle order
    pub const ALL: [ConnectionStatus; 5] = [
        ConnectionStatus::Connecting,
        ConnectionStatus::Connected,
        ConnectionStatus::SubscriptionFailed,
        ConnectionStatus::ConnectionFailed,
        ConnectionStatus::Disconnected,
    ];

    /// A failure was reported for the current attempt
    pub fn is_failure(self) -> bool {
        matches!(self, ConnectionStatus::SubscriptionFailed | ConnectionStatus::ConnectionFailed)
    }

    /// Terminal for the current connection instance
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Disconnected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::SubscriptionFailed => "subscription failed",
            ConnectionStatus::ConnectionFailed => "connection failed",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}
