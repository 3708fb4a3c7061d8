// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQS adapter against a mock JSON-protocol endpoint.

use std::time::Duration;

use mqlens_core::profile::SqsParams;
use mqlens_core::{
    AdapterSettings, BrowseOptions, ConnectionParams, MessagingProvider, MqError, ObjectKind,
    PropertyMap,
};
use mqlens_sqs::SqsAdapter;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

fn action(name: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", format!("AmazonSQS.{name}")))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn failure(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "__type": format!("com.amazonaws.sqs#{code}"),
        "message": "rejected"
    }))
}

fn queue_url(server: &MockServer, name: &str) -> String {
    format!("{}/000000000000/{name}", server.uri())
}

fn params(server: &MockServer) -> ConnectionParams {
    ConnectionParams::AwsSqs(SqsParams {
        region: "us-east-1".into(),
        access_key_id: Some("AKIDEXAMPLE".into()),
        secret_access_key: Some("secret".into()),
        endpoint: Some(server.uri()),
        ..SqsParams::default()
    })
}

fn settings() -> AdapterSettings {
    AdapterSettings {
        connect_timeout: Duration::from_secs(2),
        operation_timeout: Duration::from_secs(2),
        receive_wait: Duration::from_secs(0),
        ..AdapterSettings::default()
    }
}

async fn connected(server: &MockServer) -> SqsAdapter {
    action("ListQueues")
        .respond_with(ok(json!({
            "QueueUrls": [queue_url(server, "orders"), queue_url(server, "audit.fifo")]
        })))
        .with_priority(10)
        .mount(server)
        .await;
    action("GetQueueUrl")
        .and(body_partial_json(json!({"QueueName": "orders"})))
        .respond_with(ok(json!({"QueueUrl": queue_url(server, "orders")})))
        .mount(server)
        .await;
    let adapter = SqsAdapter::new(settings());
    adapter.connect(&params(server)).await.unwrap();
    adapter
}

/// Serves `ids` one per `ReceiveMessage`, then an empty response.
async fn mount_receive(server: &MockServer, ids: &[&str]) {
    for (i, id) in ids.iter().enumerate() {
        action("ReceiveMessage")
            .respond_with(ok(json!({
                "Messages": [{
                    "MessageId": id,
                    "ReceiptHandle": format!("rh-{id}"),
                    "Body": format!("body of {id}"),
                    "Attributes": {"SentTimestamp": "1700000000000", "ApproximateReceiveCount": "1"}
                }]
            })))
            .up_to_n_times(1)
            .with_priority(1 + i as u8)
            .mount(server)
            .await;
    }
    action("ReceiveMessage")
        .respond_with(ok(json!({})))
        .with_priority(100)
        .mount(server)
        .await;
}

async fn expect_release(server: &MockServer, id: &str, times: u64) {
    action("ChangeMessageVisibility")
        .and(body_partial_json(json!({"ReceiptHandle": format!("rh-{id}"), "VisibilityTimeout": 0})))
        .respond_with(ok(json!({})))
        .expect(times)
        .mount(server)
        .await;
}

async fn expect_delete(server: &MockServer, id: &str, times: u64) {
    action("DeleteMessage")
        .and(body_partial_json(json!({"ReceiptHandle": format!("rh-{id}")})))
        .respond_with(ok(json!({})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn requests_are_signed_json_1_0() {
    let server = MockServer::start().await;
    action("ListQueues")
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(header("content-type", "application/x-amz-json-1.0"))
        .and(body_partial_json(json!({"MaxResults": 1})))
        .respond_with(ok(json!({"QueueUrls": []})))
        .expect(1)
        .mount(&server)
        .await;
    let adapter = SqsAdapter::new(settings());
    adapter.connect(&params(&server)).await.unwrap();
    assert!(adapter.is_connected());
}

#[tokio::test]
async fn bad_signature_is_authorization_denied() {
    let server = MockServer::start().await;
    action("ListQueues")
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "__type": "com.amazon.coral.service#SignatureDoesNotMatch",
            "message": "The request signature we calculated does not match"
        })))
        .mount(&server)
        .await;
    let adapter = SqsAdapter::new(settings());
    let err = adapter.connect(&params(&server)).await.unwrap_err();
    assert!(err.is_authorization_denied(), "got {err:?}");
}

#[tokio::test]
async fn list_follows_next_token_and_filters() {
    let server = MockServer::start().await;
    action("ListQueues")
        .and(body_partial_json(json!({"NextToken": "page-2"})))
        .respond_with(ok(json!({"QueueUrls": [queue_url(&server, "billing")]})))
        .with_priority(1)
        .mount(&server)
        .await;
    action("ListQueues")
        .respond_with(ok(json!({
            "QueueUrls": [queue_url(&server, "orders"), queue_url(&server, "audit.fifo")],
            "NextToken": "page-2"
        })))
        .with_priority(5)
        .mount(&server)
        .await;
    let adapter = SqsAdapter::new(settings());
    adapter.connect(&params(&server)).await.unwrap();

    let names: Vec<String> = adapter
        .list_queues(None)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.name)
        .collect();
    assert_eq!(names, ["audit.fifo", "billing", "orders"]);

    let fifo = adapter.list_queues(Some("*.FIFO")).await.unwrap();
    assert_eq!(fifo.len(), 1);
    assert_eq!(fifo[0].name, "audit.fifo");
}

#[tokio::test]
async fn profile_prefix_is_sent_to_list_queues() {
    let server = MockServer::start().await;
    action("ListQueues")
        .and(body_partial_json(json!({"QueueNamePrefix": "ord"})))
        .respond_with(ok(json!({"QueueUrls": [queue_url(&server, "orders")]})))
        .expect(2)
        .mount(&server)
        .await;
    let adapter = SqsAdapter::new(settings());
    adapter
        .connect(&ConnectionParams::AwsSqs(SqsParams {
            region: "us-east-1".into(),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("secret".into()),
            endpoint: Some(server.uri()),
            queue_name_prefix: Some("ord".into()),
        }))
        .await
        .unwrap();
    assert_eq!(adapter.list_queues(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn properties_depth_and_missing_queue() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    action("GetQueueAttributes")
        .and(body_partial_json(json!({"QueueUrl": queue_url(&server, "orders")})))
        .respond_with(ok(json!({"Attributes": {
            "ApproximateNumberOfMessages": "4",
            "ApproximateNumberOfMessagesNotVisible": "1",
            "QueueArn": "arn:aws:sqs:us-east-1:000000000000:orders"
        }})))
        .mount(&server)
        .await;
    action("GetQueueUrl")
        .and(body_partial_json(json!({"QueueName": "ghost"})))
        .respond_with(failure("QueueDoesNotExist"))
        .mount(&server)
        .await;

    let props = adapter.get_queue_properties("orders").await.unwrap();
    assert_eq!(props.depth, Some(4));
    assert_eq!(props.attributes["ApproximateNumberOfMessagesNotVisible"], json!("1"));
    assert!(props.description.unwrap().starts_with("standard queue"));
    assert_eq!(adapter.get_queue_depth("orders").await.unwrap(), 4);

    let err = adapter.get_queue_depth("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        MqError::ObjectNotFound { kind: ObjectKind::Queue, ref name } if name == "ghost"
    ));
}

#[tokio::test]
async fn browse_releases_every_lease() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_receive(&server, &["A", "B", "C"]).await;
    expect_release(&server, "A", 1).await;
    expect_release(&server, "B", 1).await;
    expect_release(&server, "C", 0).await;

    let messages = adapter
        .browse_messages("orders", &BrowseOptions::new(1, 1))
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "B");
    assert_eq!(messages[0].payload, b"body of B");
    assert_eq!(messages[0].timestamp.unwrap().timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn delete_removes_match_and_releases_the_rest() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_receive(&server, &["A", "B"]).await;
    expect_delete(&server, "B", 1).await;
    expect_delete(&server, "A", 0).await;
    expect_release(&server, "A", 1).await;

    adapter.delete_message("orders", "B").await.unwrap();
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    mount_receive(&server, &["A"]).await;
    expect_release(&server, "A", 1).await;

    let err = adapter.delete_message("orders", "Z").await.unwrap_err();
    assert!(matches!(err, MqError::ObjectNotFound { kind: ObjectKind::Message, .. }));
}

#[tokio::test]
async fn clear_uses_purge() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    action("PurgeQueue")
        .and(body_partial_json(json!({"QueueUrl": queue_url(&server, "orders")})))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    action("ReceiveMessage")
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    adapter.clear_queue("orders").await.unwrap();
}

#[tokio::test]
async fn clear_falls_back_to_leases_while_purge_runs() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    action("PurgeQueue")
        .respond_with(failure("PurgeQueueInProgress"))
        .mount(&server)
        .await;
    mount_receive(&server, &["A", "B"]).await;
    expect_delete(&server, "A", 1).await;
    expect_delete(&server, "B", 1).await;

    adapter.clear_queue("orders").await.unwrap();
}

#[tokio::test]
async fn put_sends_attributes_and_rejects_binary() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    action("SendMessage")
        .and(body_partial_json(json!({
            "QueueUrl": queue_url(&server, "orders"),
            "MessageBody": "hello",
            "MessageAttributes": {"region": {"DataType": "String", "StringValue": "eu"}}
        })))
        .respond_with(ok(json!({"MessageId": "new-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let props: PropertyMap = [("region".to_string(), json!("eu"))].into_iter().collect();
    adapter
        .put_message("orders", b"hello", Some(&props))
        .await
        .unwrap();

    let err = adapter
        .put_message("orders", &[0xff, 0xfe], None)
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn queue_url_is_resolved_once() {
    let server = MockServer::start().await;
    action("ListQueues")
        .respond_with(ok(json!({"QueueUrls": []})))
        .mount(&server)
        .await;
    action("GetQueueUrl")
        .respond_with(ok(json!({"QueueUrl": queue_url(&server, "jobs")})))
        .expect(1)
        .mount(&server)
        .await;
    action("GetQueueAttributes")
        .respond_with(ok(json!({"Attributes": {"ApproximateNumberOfMessages": "0"}})))
        .expect(2)
        .mount(&server)
        .await;
    let adapter = SqsAdapter::new(settings());
    adapter.connect(&params(&server)).await.unwrap();

    assert_eq!(adapter.get_queue_depth("jobs").await.unwrap(), 0);
    assert_eq!(adapter.get_queue_depth("jobs").await.unwrap(), 0);
}
