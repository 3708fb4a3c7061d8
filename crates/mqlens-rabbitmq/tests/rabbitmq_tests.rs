// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RabbitMQ adapter against a mock management API.

use std::time::Duration;

use mqlens_core::profile::RabbitMqParams;
use mqlens_core::{AdapterSettings, BrowseOptions, ConnectionParams, MessagingProvider, MqError};
use mqlens_rabbitmq::RabbitMqAdapter;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOLDING_PATH: &str = r"^/api/queues/%2F/mqtest\.hold\.[0-9a-f]+$";
const HOLDING_GET: &str = r"^/api/queues/%2F/mqtest\.hold\.[0-9a-f]+/get$";

fn settings() -> AdapterSettings {
    AdapterSettings {
        operation_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(2),
        batch_size: 10,
        holding_queue_prefix: "mqtest.hold".into(),
        ..AdapterSettings::default()
    }
}

fn params(server: &MockServer) -> ConnectionParams {
    ConnectionParams::RabbitMq(RabbitMqParams {
        management_url: Some(server.uri()),
        username: Some("guest".into()),
        password: Some("guest".into()),
        ..RabbitMqParams::default()
    })
}

fn amqp(id: &str) -> Value {
    json!({
        "payload": base64_of(id),
        "payload_encoding": "base64",
        "properties": {"message_id": id},
        "routing_key": "orders",
        "exchange": "",
        "redelivered": false
    })
}

fn base64_of(s: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(s)
}

async fn connected(server: &MockServer) -> RabbitMqAdapter {
    Mock::given(method("GET"))
        .and(path("/api/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rabbitmq_version": "3.13.0"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/vhosts/%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "/"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/queues/%2F/orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "orders", "messages": 3, "durable": true})),
        )
        .mount(server)
        .await;
    let adapter = RabbitMqAdapter::new(settings());
    adapter.connect(&params(server)).await.unwrap();
    adapter
}

/// Mounts a drain cycle: the source queue yields `ids` once, the holding
/// queue accepts and returns whatever was kept, and replays are routed.
async fn mount_drain(server: &MockServer, ids: &[&str], kept: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/api/queues/%2F/orders/get"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(Value::Array(ids.iter().map(|id| amqp(id)).collect())),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/queues/%2F/orders/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(HOLDING_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(HOLDING_GET))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(Value::Array(kept.iter().map(|id| amqp(id)).collect())),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(HOLDING_GET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/exchanges/%2F/amq.default/publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"routed": true})))
        .expect((kept.len() * 2) as u64)
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(HOLDING_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn connect_rejects_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(path("/api/overview"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let adapter = RabbitMqAdapter::new(settings());
    let err = adapter.connect(&params(&server)).await.unwrap_err();
    assert!(err.is_authorization_denied(), "got {err:?}");
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn connect_reports_missing_vhost() {
    let server = MockServer::start().await;
    Mock::given(path("/api/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(path("/api/vhosts/%2F"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let adapter = RabbitMqAdapter::new(settings());
    let err = adapter.connect(&params(&server)).await.unwrap_err();
    assert!(matches!(err, MqError::InvalidProfile(_)), "got {err:?}");
}

#[tokio::test]
async fn list_hides_holding_queues_and_filters() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/queues/%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "orders", "messages": 3},
            {"name": "orders.dlq"},
            {"name": "payments", "messages": 1},
            {"name": "mqtest.hold.abc", "messages": 2}
        ])))
        .mount(&server)
        .await;

    let all = adapter.list_queues(None).await.unwrap();
    let names: Vec<_> = all.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, ["orders", "orders.dlq", "payments"]);
    assert_eq!(all[1].depth, Some(0));

    let filtered = adapter.list_queues(Some("ORDERS*")).await.unwrap();
    assert_eq!(filtered.len(), 2);
}

#[tokio::test]
async fn browse_drains_and_replays() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_drain(&server, &["A", "B", "C"], &["A", "B", "C"]).await;

    let out = adapter
        .browse_messages("orders", &BrowseOptions::new(2, 1))
        .await
        .unwrap();
    let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["B", "C"]);
    assert_eq!(out[0].payload, b"B");
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_drain(&server, &["A"], &["A"]).await;

    let err = adapter.delete_message("orders", "zz").await.unwrap_err();
    assert_eq!(err.to_string(), "message not found: zz");
}

#[tokio::test]
async fn delete_messages_discards_matches() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_drain(&server, &["A", "B", "C"], &["A", "C"]).await;

    let removed = adapter
        .delete_messages("orders", &["B".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn put_to_missing_queue_is_not_found() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/exchanges/%2F/amq.default/publish"))
        .and(body_partial_json(json!({
            "routing_key": "ghost",
            "payload_encoding": "base64",
            "properties": {"delivery_mode": 2}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"routed": false})))
        .mount(&server)
        .await;

    let err = adapter.put_message("ghost", b"hi", None).await.unwrap_err();
    assert_eq!(err.to_string(), "queue not found: ghost");
}

#[tokio::test]
async fn clear_purges_contents() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/queues/%2F/orders/contents"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    adapter.clear_queue("orders").await.unwrap();
}

#[tokio::test]
async fn topics_are_topic_exchanges() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/exchanges/%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "", "type": "direct"},
            {"name": "amq.topic", "type": "topic", "durable": true},
            {"name": "events", "type": "topic", "durable": true},
            {"name": "logs", "type": "fanout"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/exchanges/%2F/events"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "events", "type": "topic", "durable": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/exchanges/%2F/events/bindings/source"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}, {}])))
        .mount(&server)
        .await;

    let topics = adapter.topics().unwrap();
    let names: Vec<_> = topics
        .list_topics(None)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["amq.topic", "events"]);

    let props = topics.get_topic_properties("events").await.unwrap();
    assert_eq!(props.subscription_count, Some(2));
}

#[tokio::test]
async fn disconnect_returns_to_not_connected() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    adapter.disconnect().await.unwrap();
    assert!(matches!(
        adapter.get_queue_depth("orders").await,
        Err(MqError::NotConnected)
    ));
}
