//! Connection lifecycle state machine
//!
//! The machine is pure: [`Lifecycle::handle`] maps one event to one
//! [`Transition`] and never touches the transport. The [`Driver`](crate::driver::Driver)
//! executes the returned [`Action`] and publishes the returned status.
//!
//! ```text
//! Idle --Activate--> Connecting --HandshakeSucceeded--> Connected
//!                        |                                  |
//!                        +--------TransportFailed-----------+--> Failed --Retry--> Connecting
//!
//! any non-closed state --Teardown--> Closed
//! ```

use tracing::debug;

use crate::types::ConnectionStatus;

/// Internal lifecycle state of a connection instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not activated yet
    Idle,
    /// Handshake pending
    Connecting,
    /// Transport open (subscription may still have failed)
    Connected,
    /// Transport failed and was closed
    Failed,
    /// Torn down, terminal
    Closed,
}

/// Events driving the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Owner activated the connection
    Activate,
    /// Broker accepted the handshake
    HandshakeSucceeded,
    /// Broker confirmed the subscription
    SubscribeAcknowledged,
    /// Broker refused the subscription, or the request could not be sent
    SubscribeRejected,
    /// Transport-level error
    TransportFailed,
    /// Reconnect policy scheduled another attempt
    Retry,
    /// Owner deactivated the connection
    Teardown,
}

/// Side effect the driver must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the transport handshake
    Connect,
    /// Request the configured subscription
    Subscribe,
    /// Close the transport
    CloseTransport,
}

/// Result of a legal event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifecycleState,
    pub to: LifecycleState,
    /// New status to publish, if it changed meaning
    pub status: Option<ConnectionStatus>,
    pub action: Option<Action>,
}

/// Lifecycle state machine for a single connection instance
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    status: ConnectionStatus,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in `Idle` reporting `Connecting`
    pub fn new() -> Self {
        Self { state: LifecycleState::Idle, status: ConnectionStatus::Connecting }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Messages are only forwarded while the transport is open
    pub fn accepts_messages(&self) -> bool {
        self.state == LifecycleState::Connected
    }

    /// Apply an event. Returns `None` for events that are not legal in the
    /// current state; those leave state and status untouched.
    pub fn handle(&mut self, event: LifecycleEvent) -> Option<Transition> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let (to, status, action) = match (self.state, event) {
            (S::Idle, E::Activate) => (S::Connecting, ConnectionStatus::Connecting, Some(Action::Connect)),
            (S::Connecting, E::HandshakeSucceeded) => {
                (S::Connected, ConnectionStatus::Connected, Some(Action::Subscribe))
            }
            (S::Connected, E::SubscribeAcknowledged) => (S::Connected, ConnectionStatus::Connected, None),
            (S::Connected, E::SubscribeRejected) => {
                (S::Connected, ConnectionStatus::SubscriptionFailed, None)
            }
            (S::Connecting | S::Connected, E::TransportFailed) => {
                (S::Failed, ConnectionStatus::ConnectionFailed, Some(Action::CloseTransport))
            }
            (S::Failed, E::Retry) => (S::Connecting, ConnectionStatus::Connecting, Some(Action::Connect)),
            (S::Connecting | S::Connected, E::Teardown) => {
                (S::Closed, ConnectionStatus::Disconnected, Some(Action::CloseTransport))
            }
            (S::Idle | S::Failed, E::Teardown) => (S::Closed, ConnectionStatus::Disconnected, None),
            (state, event) => {
                debug!(?state, ?event, "Ignoring lifecycle event");
                return None;
            }
        };

        let from = self.state;
        let changed = self.status != status;
        self.state = to;
        self.status = status;

        Some(Transition { from, to, status: changed.then_some(status), action })
    }
}
