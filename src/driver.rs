//! Driver runs the connection lifecycle against a transport

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{ImageResource, PayloadCodec};
use crate::config::ReconnectPolicy;
use crate::lifecycle::{Action, Lifecycle, LifecycleEvent, LifecycleState};
use crate::transport::{Transport, TransportEvent};
use crate::types::{ConnectionStatus, Subscription};

/// Senders the driver publishes into
pub struct DriverOutputs {
    /// Current connection status
    pub status: watch::Sender<ConnectionStatus>,
    /// Latest decoded image (last write wins)
    pub images: watch::Sender<Option<Arc<ImageResource>>>,
}

/// Handle to a spawned driver task
pub struct DriverHandle {
    /// Cancellation token; cancelling it tears the connection down
    pub cancel: CancellationToken,
    /// The lifecycle task, finished once teardown completed
    pub task: JoinHandle<()>,
}

/// Driver spawns and manages the lifecycle task
///
/// The task owns the transport exclusively. Every transport callback is
/// turned into a [`LifecycleEvent`], applied to the [`Lifecycle`], and the
/// resulting status is published before the next event is read, so status
/// updates are observed in the order their causes happened.
pub struct Driver;

impl Driver {
    /// Spawn the lifecycle task for the given transport
    ///
    /// The task starts connecting immediately and runs until the returned
    /// token is cancelled.
    pub fn spawn<T>(
        transport: T,
        subscription: Subscription,
        codec: PayloadCodec,
        policy: ReconnectPolicy,
        outputs: DriverOutputs,
    ) -> DriverHandle
    where
        T: Transport,
    {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            Self::lifecycle_task(transport, subscription, codec, policy, outputs, cancel_task).await;
        });

        DriverHandle { cancel, task }
    }

    /// Apply an event and publish the resulting status
    fn apply(
        lifecycle: &mut Lifecycle,
        event: LifecycleEvent,
        outputs: &DriverOutputs,
    ) -> Option<Action> {
        let transition = lifecycle.handle(event)?;

        debug!("Lifecycle {:?} -> {:?} on {:?}", transition.from, transition.to, event);
        if let Some(status) = transition.status {
            info!("Connection status: {}", status);
            outputs.status.send_replace(status);
        }

        transition.action
    }

    async fn lifecycle_task<T>(
        mut transport: T,
        subscription: Subscription,
        codec: PayloadCodec,
        policy: ReconnectPolicy,
        outputs: DriverOutputs,
        cancel: CancellationToken,
    ) where
        T: Transport,
    {
        info!(topic = %subscription.topic, endpoint = %subscription.endpoint, "Lifecycle task started");
        let mut lifecycle = Lifecycle::new();
        let mut retries = 0u32;
        let mut message_count = 0u64;

        loop {
            match lifecycle.state() {
                LifecycleState::Idle => {
                    Self::apply(&mut lifecycle, LifecycleEvent::Activate, &outputs);
                }

                LifecycleState::Connecting => {
                    // Teardown may race the handshake; dropping the connect
                    // future abandons it
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("Teardown during handshake");
                            break;
                        }
                        result = transport.connect() => result,
                    };

                    match result {
                        Ok(()) => {
                            retries = 0;
                            if let Some(Action::Subscribe) =
                                Self::apply(&mut lifecycle, LifecycleEvent::HandshakeSucceeded, &outputs)
                            {
                                if let Err(e) = transport.subscribe(&subscription.topic).await {
                                    warn!("Subscribe request failed: {}", e);
                                    Self::apply(&mut lifecycle, LifecycleEvent::SubscribeRejected, &outputs);
                                }
                            }
                        }
                        Err(e) => {
                            error!("Connection failed: {}", e);
                            if let Some(Action::CloseTransport) =
                                Self::apply(&mut lifecycle, LifecycleEvent::TransportFailed, &outputs)
                            {
                                transport.close().await;
                            }
                        }
                    }
                }

                LifecycleState::Connected => {
                    let event = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        event = transport.next_event() => event,
                    };

                    match event {
                        TransportEvent::SubscribeAck { granted: true } => {
                            info!("Subscribed to {}", subscription.topic);
                            Self::apply(&mut lifecycle, LifecycleEvent::SubscribeAcknowledged, &outputs);
                        }
                        TransportEvent::SubscribeAck { granted: false } => {
                            error!("Broker refused subscription to {}", subscription.topic);
                            Self::apply(&mut lifecycle, LifecycleEvent::SubscribeRejected, &outputs);
                        }
                        TransportEvent::Message(message) if subscription.matches(&message) => {
                            message_count += 1;
                            trace!("Message {}: {} bytes", message_count, message.payload.len());
                            let image = codec.decode(&message.payload);
                            outputs.images.send_replace(Some(Arc::new(image)));
                        }
                        TransportEvent::Message(message) => {
                            debug!("Ignoring message on unexpected topic {}", message.topic);
                        }
                        TransportEvent::Failed(e) => {
                            error!("Transport failed: {}", e);
                            if let Some(Action::CloseTransport) =
                                Self::apply(&mut lifecycle, LifecycleEvent::TransportFailed, &outputs)
                            {
                                transport.close().await;
                            }
                        }
                    }
                }

                LifecycleState::Failed => {
                    retries += 1;
                    match policy.delay_for(retries) {
                        Some(delay) => {
                            info!("Reconnecting in {:?} (attempt {})", delay, retries);
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(delay) => {
                                    Self::apply(&mut lifecycle, LifecycleEvent::Retry, &outputs);
                                }
                            }
                        }
                        None => {
                            debug!("No reconnect scheduled, waiting for teardown");
                            cancel.cancelled().await;
                            break;
                        }
                    }
                }

                LifecycleState::Closed => break,
            }
        }

        if let Some(Action::CloseTransport) =
            Self::apply(&mut lifecycle, LifecycleEvent::Teardown, &outputs)
        {
            transport.close().await;
        }

        info!("Lifecycle task ended (processed {} messages)", message_count);
    }
}
