//! Integration tests for the connection layer
//!
//! These tests drive a [`LiveConnection`] through scripted transports and
//! verify status propagation, image delivery and teardown behaviour.

use super::*;
use crate::codec::PayloadCodec;
use crate::config::ReconnectPolicy;
use crate::test_utils::{ScriptStep, ScriptedTransport, TransportProbe};
use crate::types::{ConnectionStatus, Subscription, UpdateRate};
use crate::view::IMAGE_LOADED;
use futures::StreamExt;
use std::time::Duration;
use tracing::info;

const TOPIC: &str = "image";

fn connection(transport: ScriptedTransport) -> (LiveConnection, TransportProbe) {
    let probe = transport.probe();
    let connection = LiveConnection::new(
        transport,
        Subscription::new(TOPIC, "wss://broker.test:9002/mqtt"),
        PayloadCodec::default(),
        ReconnectPolicy::Never,
    );
    (connection, probe)
}

async fn wait_for_status(connection: &LiveConnection, wanted: ConnectionStatus) {
    let mut updates = Box::pin(connection.status_updates());
    tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(status) = updates.next().await {
            if status == wanted {
                return;
            }
        }
        panic!("status stream ended before {wanted}");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"));
}

async fn wait_for_image_body(connection: &LiveConnection, body: &str) {
    let mut images = Box::pin(connection.images(UpdateRate::Native));
    tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(image) = images.next().await {
            if image.body() == body {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for image {body}"));
}

#[tokio::test]
async fn connect_subscribe_and_receive() {
    let _ = tracing_subscriber::fmt::try_init();

    let (mut connection, probe) = connection(
        ScriptedTransport::new()
            .script([ScriptStep::Ack(true), ScriptStep::image(TOPIC, b"\x89PNG frame one")]),
    );
    assert_eq!(connection.status(), ConnectionStatus::Connecting);
    assert!(connection.current_image().is_none());

    assert!(connection.activate());
    wait_for_status(&connection, ConnectionStatus::Connected).await;

    let mut images = Box::pin(connection.images(UpdateRate::Native));
    let image = tokio::time::timeout(Duration::from_secs(1), images.next())
        .await
        .expect("image not delivered")
        .expect("image stream ended");

    assert_eq!(image.decoded_bytes().unwrap(), b"\x89PNG frame one");
    assert_eq!(probe.subscribe_calls(), 1);
    info!("Received image {}", image.uri());

    connection.teardown().await;
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn activation_is_idempotent() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([ScriptStep::Ack(true)]));

    assert!(connection.activate());
    assert!(!connection.activate());
    assert!(connection.is_active());
    wait_for_status(&connection, ConnectionStatus::Connected).await;

    assert_eq!(probe.connect_calls(), 1);
    assert_eq!(probe.subscribe_calls(), 1);

    connection.teardown().await;
    assert!(!connection.activate(), "torn down connections never reactivate");
    assert_eq!(probe.connect_calls(), 1);
}

#[tokio::test]
async fn subscription_failure_keeps_transport_open() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([ScriptStep::Ack(false)]));

    connection.activate();
    wait_for_status(&connection, ConnectionStatus::SubscriptionFailed).await;
    assert!(probe.is_open());
    assert_eq!(probe.close_calls(), 0);

    // A message arriving afterwards is still delivered
    probe.push(ScriptStep::Message { topic: TOPIC.into(), payload: "c3RpbGwgaGVyZQ==".into() });
    wait_for_image_body(&connection, "c3RpbGwgaGVyZQ==").await;
    assert_eq!(connection.status(), ConnectionStatus::SubscriptionFailed);

    connection.teardown().await;
    assert_eq!(probe.close_calls(), 1);
}

#[tokio::test]
async fn rejected_subscribe_request_reports_failure() {
    let (mut connection, probe) = connection(ScriptedTransport::new().reject_subscribe_requests());

    connection.activate();
    wait_for_status(&connection, ConnectionStatus::SubscriptionFailed).await;
    assert!(probe.is_open());

    connection.teardown().await;
}

#[tokio::test]
async fn transport_error_closes_without_retry() {
    let (mut connection, probe) = connection(
        ScriptedTransport::new().script([ScriptStep::Ack(true), ScriptStep::Fail("reset by peer".into())]),
    );

    connection.activate();
    wait_for_status(&connection, ConnectionStatus::ConnectionFailed).await;
    assert_eq!(probe.close_calls(), 1);
    assert!(!probe.is_open());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.connect_calls(), 1);

    connection.teardown().await;
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    assert_eq!(probe.close_calls(), 1, "failed transport is not closed twice");
}

#[tokio::test]
async fn handshake_failure_reports_connection_failed() {
    let (mut connection, probe) = connection(ScriptedTransport::new().connect_results([false]));

    connection.activate();
    wait_for_status(&connection, ConnectionStatus::ConnectionFailed).await;
    assert_eq!(probe.subscribe_calls(), 0);

    connection.teardown().await;
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([ScriptStep::Ack(true)]));

    connection.activate();
    wait_for_status(&connection, ConnectionStatus::Connected).await;

    connection.teardown().await;
    connection.teardown().await;
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    assert_eq!(probe.close_calls(), 1);
    assert!(!connection.is_active());
}

#[tokio::test]
async fn teardown_during_pending_connect() {
    let (mut connection, probe) =
        connection(ScriptedTransport::new().connect_delay(Duration::from_secs(30)));

    connection.activate();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(probe.connect_calls(), 1);
    assert_eq!(connection.status(), ConnectionStatus::Connecting);

    tokio::time::timeout(Duration::from_secs(1), connection.teardown())
        .await
        .expect("teardown must not wait for the handshake");
    connection.teardown().await;

    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    assert_eq!(probe.close_calls(), 1);
    assert!(!probe.is_open());
}

#[tokio::test]
async fn teardown_before_activation() {
    let (mut connection, probe) = connection(ScriptedTransport::new());

    connection.teardown().await;
    assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    assert_eq!(probe.connect_calls(), 0);
    assert!(!connection.activate());
}

#[tokio::test]
async fn last_image_wins() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([ScriptStep::Ack(true)]));
    connection.activate();
    wait_for_status(&connection, ConnectionStatus::Connected).await;

    probe.push(ScriptStep::image(TOPIC, b"first"));
    probe.push(ScriptStep::image(TOPIC, b"second"));
    wait_for_image_body(&connection, "c2Vjb25k").await;

    let current = connection.current_image().expect("an image is current");
    assert_eq!(current.decoded_bytes().unwrap(), b"second");

    connection.teardown().await;
    // The last image stays available after teardown
    assert_eq!(connection.current_image().unwrap().body(), "c2Vjb25k");
}

#[tokio::test]
async fn messages_on_other_topics_are_ignored() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([
        ScriptStep::Ack(true),
        ScriptStep::image("other/topic", b"ignored"),
        ScriptStep::image(TOPIC, b"kept"),
    ]));

    connection.activate();
    wait_for_image_body(&connection, "a2VwdA==").await;
    assert_eq!(connection.current_image().unwrap().decoded_bytes().unwrap(), b"kept");

    connection.teardown().await;
    drop(probe);
}

#[tokio::test]
async fn malformed_payload_degrades_one_frame() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([
        ScriptStep::Ack(true),
        ScriptStep::Message { topic: TOPIC.into(), payload: "%%% not base64 %%%".into() },
    ]));

    connection.activate();
    wait_for_image_body(&connection, "%%% not base64 %%%").await;
    assert!(connection.current_image().unwrap().decoded_bytes().is_err());
    assert_eq!(connection.status(), ConnectionStatus::Connected);

    probe.push(ScriptStep::image(TOPIC, b"recovered"));
    wait_for_image_body(&connection, "cmVjb3ZlcmVk").await;

    connection.teardown().await;
}

#[tokio::test]
async fn view_updates_follow_status_and_images() {
    let (mut connection, probe) = connection(ScriptedTransport::new());
    let mut view = Box::pin(connection.view_updates(UpdateRate::Native));

    let initial = view.next().await.unwrap();
    assert_eq!(initial.status_text, "Connecting...");

    connection.activate();
    probe.push(ScriptStep::Ack(true));

    let connected = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let state = view.next().await.unwrap();
            if state.status_text == "Connected" {
                return state;
            }
        }
    })
    .await
    .unwrap();
    assert!(connected.current_image.is_none());

    probe.push(ScriptStep::image(TOPIC, b"overlay"));
    let loaded = tokio::time::timeout(Duration::from_secs(1), view.next()).await.unwrap().unwrap();
    assert_eq!(loaded.image_status_text, IMAGE_LOADED);
    assert_eq!(loaded.status_text, "Connected");
    assert_eq!(loaded.current_image_uri(), Some("data:image/png;base64,b3ZlcmxheQ=="));

    connection.teardown().await;
    let disconnected = tokio::time::timeout(Duration::from_secs(1), view.next()).await.unwrap().unwrap();
    assert_eq!(disconnected.status_text, "Disconnected");
    assert_eq!(disconnected.image_status_text, IMAGE_LOADED);
}

#[tokio::test]
async fn dropping_connection_cancels_driver() {
    let (mut connection, probe) = connection(ScriptedTransport::new().script([ScriptStep::Ack(true)]));
    connection.activate();
    wait_for_status(&connection, ConnectionStatus::Connected).await;

    let mut updates = Box::pin(connection.status_updates());
    drop(connection);

    tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(status) = updates.next().await {
            if status == ConnectionStatus::Disconnected {
                return;
            }
        }
        panic!("status stream ended before Disconnected");
    })
    .await
    .expect("driver did not stop");
    assert_eq!(probe.close_calls(), 1);
}
