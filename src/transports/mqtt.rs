//! MQTT transport over `rumqttc`

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::config::{BrokerConfig, Scheme};
use crate::transport::{Transport, TransportEvent};
use crate::types::InboundMessage;
use crate::{HeatcastError, Result};

/// Request channel capacity between client handle and event loop
const REQUEST_CAPACITY: usize = 16;

/// How long `close` keeps polling to flush the DISCONNECT packet
const DISCONNECT_FLUSH: Duration = Duration::from_millis(250);

/// An open client/event-loop pair
struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Cleared after a transport error; a failed event loop must not be
    /// polled again because `rumqttc` would silently reconnect
    healthy: bool,
}

/// Transport talking MQTT 3.1.1 to a broker over TCP, TLS or websockets
pub struct MqttTransport {
    options: MqttOptions,
    endpoint: String,
    session: Option<Session>,
}

impl MqttTransport {
    /// Build a transport from broker settings
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let client_id = config.client_id();

        let mut options = match endpoint.scheme {
            Scheme::Tcp | Scheme::Tls => {
                MqttOptions::new(client_id.as_str(), endpoint.host.as_str(), endpoint.port)
            }
            Scheme::Ws | Scheme::Wss => {
                MqttOptions::new(client_id.as_str(), endpoint.url.as_str(), endpoint.port)
            }
        };

        match endpoint.scheme {
            Scheme::Tcp => {}
            Scheme::Tls => {
                options.set_transport(rumqttc::Transport::tls_with_default_config());
            }
            Scheme::Ws => {
                options.set_transport(rumqttc::Transport::Ws);
            }
            Scheme::Wss => {
                options.set_transport(rumqttc::Transport::wss_with_default_config());
            }
        }

        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);
        if let Some(credentials) = &config.credentials {
            options.set_credentials(credentials.username.as_str(), credentials.password.as_str());
        }

        debug!(client_id = %client_id, endpoint = %endpoint.url, "MQTT transport configured");

        Ok(Self { options, endpoint: endpoint.url, session: None })
    }

    /// Broker endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_error(&self, err: ConnectionError) -> HeatcastError {
        HeatcastError::connection_failed_with_source(
            format!("transport error on {}", self.endpoint),
            Box::new(err),
        )
    }
}

fn all_granted(codes: &[SubscribeReasonCode]) -> bool {
    !codes.is_empty() && codes.iter().all(|code| matches!(code, SubscribeReasonCode::Success(_)))
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<()> {
        // A previous session may still linger after a failure
        self.close().await;

        info!("Connecting to MQTT broker at {}", self.endpoint);
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(session_present = ack.session_present, "MQTT handshake complete");
                    self.session = Some(Session { client, eventloop, healthy: true });
                    return Ok(());
                }
                Ok(event) => trace!(?event, "Event before CONNACK"),
                Err(err) => {
                    warn!("MQTT handshake failed: {}", err);
                    return Err(self.connection_error(err));
                }
            }
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| HeatcastError::subscribe_failed(topic, "transport is not connected"))?;

        session
            .client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| HeatcastError::subscribe_failed(topic, e.to_string()))?;

        debug!("Subscribe request queued for '{}'", topic);
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        let Some(session) = self.session.as_mut().filter(|s| s.healthy) else {
            return TransportEvent::Failed(HeatcastError::connection_failed("transport is closed"));
        };

        loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    trace!(topic = %publish.topic, bytes = publish.payload.len(), "PUBLISH received");
                    return TransportEvent::Message(InboundMessage::new(
                        publish.topic,
                        publish.payload,
                    ));
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    return TransportEvent::SubscribeAck { granted: all_granted(&ack.return_codes) };
                }
                Ok(event) => trace!(?event, "MQTT event"),
                Err(err) => {
                    session.healthy = false;
                    let err = HeatcastError::connection_failed_with_source(
                        format!("transport error on {}", self.endpoint),
                        Box::new(err),
                    );
                    return TransportEvent::Failed(err);
                }
            }
        }
    }

    async fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if !session.healthy {
            debug!("Dropping failed MQTT session");
            return;
        }

        if let Err(e) = session.client.disconnect().await {
            debug!("Disconnect request not queued: {}", e);
            return;
        }

        // Poll until the DISCONNECT packet has been written
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH, async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("DISCONNECT not flushed within {:?}", DISCONNECT_FLUSH);
        }
        info!("MQTT transport closed");
    }
}
