//! Live broker connection

use futures::{Stream, StreamExt, future};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::codec::{ImageResource, PayloadCodec};
use crate::config::{BrokerConfig, ReconnectPolicy};
use crate::driver::{Driver, DriverHandle, DriverOutputs};
use crate::stream::ThrottleExt;
use crate::transport::Transport;
use crate::transports::MqttTransport;
use crate::types::{ConnectionStatus, Subscription, UpdateRate};
use crate::view::{ViewEvent, ViewProjector, ViewState};
use crate::Result;

/// Activation progress of a [`LiveConnection`]
enum Phase {
    /// Not activated; owns the transport and the senders until then
    Idle { transport: Box<dyn Transport>, outputs: DriverOutputs },
    /// Driver task running
    Active(DriverHandle),
    /// Torn down
    Closed,
}

/// Owner of the single logical broker connection
///
/// The connection is created idle. [`activate`](LiveConnection::activate)
/// spawns the lifecycle task exactly once; further calls are no-ops.
/// [`teardown`](LiveConnection::teardown) closes the transport and reports
/// [`ConnectionStatus::Disconnected`]; it is idempotent and safe while a
/// handshake is still in flight. Dropping the connection cancels the task.
pub struct LiveConnection {
    /// Topic and endpoint
    subscription: Subscription,

    /// Payload codec handed to the driver
    codec: PayloadCodec,

    /// What happens after transport failures
    policy: ReconnectPolicy,

    /// Status watch receiver
    status: watch::Receiver<ConnectionStatus>,

    /// Image watch receiver
    images: watch::Receiver<Option<Arc<ImageResource>>>,

    phase: Phase,
}

impl LiveConnection {
    /// Create an idle connection over any transport
    pub fn new<T: Transport>(
        transport: T,
        subscription: Subscription,
        codec: PayloadCodec,
        policy: ReconnectPolicy,
    ) -> Self {
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);
        let (images_tx, images) = watch::channel(None);

        Self {
            subscription,
            codec,
            policy,
            status,
            images,
            phase: Phase::Idle {
                transport: Box::new(transport),
                outputs: DriverOutputs { status: status_tx, images: images_tx },
            },
        }
    }

    /// Create an idle MQTT connection from broker settings
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let transport = MqttTransport::from_config(config)?;
        let subscription = Subscription::new(&config.topic, transport.endpoint());
        Ok(Self::new(
            transport,
            subscription,
            PayloadCodec::new(&config.media_type),
            config.reconnect,
        ))
    }

    /// Start connecting.
    ///
    /// Returns `true` if this call spawned the lifecycle task, `false` if the
    /// connection was already active or torn down. Must be called within a
    /// Tokio runtime.
    pub fn activate(&mut self) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Idle { transport, outputs } => {
                info!("Activating connection to {} ({})", self.subscription.endpoint, self.subscription.topic);
                let handle = Driver::spawn(
                    transport,
                    self.subscription.clone(),
                    self.codec.clone(),
                    self.policy,
                    outputs,
                );
                self.phase = Phase::Active(handle);
                true
            }
            other => {
                debug!("Connection already activated, ignoring");
                self.phase = other;
                false
            }
        }
    }

    /// Whether the lifecycle task has been spawned and not torn down
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Tear the connection down.
    ///
    /// Waits until the transport is closed. Calling it again, or before
    /// activation, is harmless; the final status is always `Disconnected`.
    pub async fn teardown(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Active(handle) => {
                info!("Tearing down connection");
                handle.cancel.cancel();
                if let Err(e) = handle.task.await {
                    warn!("Lifecycle task ended abnormally: {}", e);
                }
            }
            Phase::Idle { outputs, .. } => {
                debug!("Tearing down connection that was never activated");
                outputs.status.send_replace(ConnectionStatus::Disconnected);
            }
            Phase::Closed => debug!("Connection already torn down"),
        }
    }

    /// The subscription this connection serves
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Status changes as a stream, starting with the current status
    pub fn status_updates(&self) -> impl Stream<Item = ConnectionStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Most recently decoded image, if any
    pub fn current_image(&self) -> Option<Arc<ImageResource>> {
        self.images.borrow().clone()
    }

    /// Decoded images as a stream, starting with the current image
    ///
    /// Slow consumers skip intermediate images; with `UpdateRate::Max` at
    /// most one image per interval is yielded, always the latest.
    pub fn images(&self, rate: UpdateRate) -> impl Stream<Item = Arc<ImageResource>> + 'static {
        let images = WatchStream::new(self.images.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => images.boxed(),
            Some(interval) => images.throttle(interval).boxed(),
        }
    }

    /// View state for the presentation layer, updated on every status
    /// change and every image
    pub fn view_updates(&self, rate: UpdateRate) -> impl Stream<Item = ViewState> + 'static {
        let statuses = self.status_updates().map(ViewEvent::Status);
        let images = self.images(rate).map(ViewEvent::Image);

        futures::stream::select(statuses, images).scan(ViewProjector::new(), |projector, event| {
            future::ready(Some(projector.apply(event).clone()))
        })
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        if let Phase::Active(handle) = &self.phase {
            debug!("Dropping live connection");
            // Cancel tasks on drop for clean shutdown
            handle.cancel.cancel();
        }
    }
}
