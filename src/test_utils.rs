//! Test utilities: scripted transports and an in-memory network
//!
//! [`ScriptedTransport`] replays transport events pushed through a
//! [`TransportProbe`], and [`CountingFetcher`] serves canned responses while
//! counting every network call.

#![cfg(any(test, feature = "benchmark"))]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::{CachedResponse, Fetcher, ResourceRequest};
use crate::transport::{Transport, TransportEvent};
use crate::types::InboundMessage;
use crate::{HeatcastError, Result};

/// One scripted transport event
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// SUBACK with the given grant
    Ack(bool),
    /// PUBLISH on a topic
    Message { topic: String, payload: Bytes },
    /// Transport-level failure
    Fail(String),
}

impl ScriptStep {
    /// A message whose body is `bytes` encoded as base64
    pub fn image(topic: &str, bytes: &[u8]) -> Self {
        ScriptStep::Message { topic: topic.to_string(), payload: Bytes::from(STANDARD.encode(bytes)) }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    connect_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    close_calls: AtomicUsize,
    open: AtomicBool,
}

/// Observer and event source for a [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct TransportProbe {
    state: Arc<ProbeState>,
    events: mpsc::UnboundedSender<ScriptStep>,
}

impl TransportProbe {
    /// Queue an event for the transport
    pub fn push(&self, step: ScriptStep) {
        let _ = self.events.send(step);
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    /// Whether the transport currently holds an open connection
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }
}

/// Transport that replays scripted events
pub struct ScriptedTransport {
    connect_results: VecDeque<bool>,
    connect_delay: Option<Duration>,
    subscribe_ok: bool,
    probe: TransportProbe,
    events: mpsc::UnboundedReceiver<ScriptStep>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Transport whose handshakes succeed and that has no queued events
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = TransportProbe { state: Arc::new(ProbeState::default()), events: tx };
        Self {
            connect_results: VecDeque::new(),
            connect_delay: None,
            subscribe_ok: true,
            probe,
            events: rx,
        }
    }

    /// Outcomes of successive handshakes; once exhausted, handshakes succeed
    pub fn connect_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.connect_results = results.into_iter().collect();
        self
    }

    /// Delay every handshake
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Make subscribe requests fail before reaching the broker
    pub fn reject_subscribe_requests(mut self) -> Self {
        self.subscribe_ok = false;
        self
    }

    /// Queue events delivered after the handshake
    pub fn script(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        for step in steps {
            self.probe.push(step);
        }
        self
    }

    /// Probe sharing this transport's counters and event queue
    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.probe.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if self.connect_results.pop_front().unwrap_or(true) {
            self.probe.state.open.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(HeatcastError::connection_failed("scripted handshake failure"))
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.probe.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.subscribe_ok {
            Ok(())
        } else {
            Err(HeatcastError::subscribe_failed(topic, "scripted request failure"))
        }
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(ScriptStep::Ack(granted)) => TransportEvent::SubscribeAck { granted },
            Some(ScriptStep::Message { topic, payload }) => {
                TransportEvent::Message(InboundMessage::new(topic, payload))
            }
            Some(ScriptStep::Fail(reason)) => {
                self.probe.state.open.store(false, Ordering::SeqCst);
                TransportEvent::Failed(HeatcastError::connection_failed(reason))
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.probe.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.state.open.store(false, Ordering::SeqCst);
    }
}

/// In-memory network that counts calls
#[derive(Debug, Clone, Default)]
pub struct CountingFetcher {
    responses: Arc<Mutex<HashMap<String, (u16, Bytes)>>>,
    calls: Arc<Mutex<Vec<String>>>,
    offline: Arc<AtomicBool>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`
    pub fn with(self, url: &str, body: &str) -> Self {
        self.with_status(url, 200, body)
    }

    /// Serve `body` with an explicit status for `url`
    pub fn with_status(self, url: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .insert(url.to_string(), (status, Bytes::from(body.to_string())));
        self
    }

    /// Fail every subsequent fetch with a network error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<CachedResponse> {
        let url = request.url().to_string();
        self.calls.lock().expect("calls lock poisoned").push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(HeatcastError::network_fetch(url, None, Some("offline".into())));
        }

        let responses = self.responses.lock().expect("responses lock poisoned");
        match responses.get(&url) {
            Some((status, body)) => Ok(CachedResponse::new(*status, "text/plain", body.clone())),
            None => Ok(CachedResponse::new(404, "text/plain", Bytes::from_static(b"not found"))),
        }
    }
}
