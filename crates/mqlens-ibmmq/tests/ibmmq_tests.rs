// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IBM MQ adapter against a mock mqweb server.

use std::time::Duration;

use mqlens_core::profile::IbmMqParams;
use mqlens_core::{
    AdapterSettings, BrowseOptions, ChannelStatus, ConnectionParams, MessagingProvider, MqError,
    ObjectKind,
};
use mqlens_ibmmq::IbmMqAdapter;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MQSC: &str = "/ibmmq/rest/v2/admin/action/qmgr/QM1/mqsc";
const QUEUE: &str = "/ibmmq/rest/v2/messaging/qmgr/QM1/queue/DEV.Q1";

fn params(server: &MockServer, known: &[&str]) -> ConnectionParams {
    ConnectionParams::IbmMq(IbmMqParams {
        queue_manager: "QM1".into(),
        host: "localhost".into(),
        rest_url: Some(format!("{}/ibmmq/rest/v2", server.uri())),
        username: Some("app".into()),
        password: Some("passw0rd".into()),
        known_queues: known.iter().map(|q| q.to_string()).collect(),
        ..IbmMqParams::default()
    })
}

fn settings() -> AdapterSettings {
    AdapterSettings {
        connect_timeout: Duration::from_secs(2),
        operation_timeout: Duration::from_secs(2),
        ..AdapterSettings::default()
    }
}

fn mqsc_ok(rows: Vec<Value>) -> ResponseTemplate {
    let responses: Vec<Value> = rows
        .into_iter()
        .map(|p| json!({"completionCode": 0, "reasonCode": 0, "parameters": p}))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "commandResponse": responses,
        "overallCompletionCode": 0,
        "overallReasonCode": 0
    }))
}

fn mqsc_failed(reason: u32) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "commandResponse": [{"completionCode": 2, "reasonCode": reason, "message": ["AMQ8000E"]}],
        "overallCompletionCode": 2,
        "overallReasonCode": 3008
    }))
}

async fn mount_mqsc(server: &MockServer, command: Value, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(MQSC))
        .and(body_partial_json(command))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn connected(server: &MockServer, known: &[&str]) -> IbmMqAdapter {
    Mock::given(method("GET"))
        .and(path("/ibmmq/rest/v2/admin/qmgr/QM1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"qmgr": [{"name": "QM1", "state": "running"}]})),
        )
        .mount(server)
        .await;
    let adapter = IbmMqAdapter::new(settings());
    adapter.connect(&params(server, known)).await.unwrap();
    adapter
}

async fn mount_message_list(server: &MockServer, ids: &[&str]) {
    let messages: Vec<Value> = ids
        .iter()
        .map(|id| json!({"messageId": id, "correlationId": "000000000000000000000000000000000000000000000000"}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("{QUEUE}/messagelist")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": messages})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn unknown_queue_manager_is_a_profile_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ibmmq/rest/v2/admin/qmgr/QM1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let adapter = IbmMqAdapter::new(settings());
    let err = adapter.connect(&params(&server, &[])).await.unwrap_err();
    assert!(matches!(err, MqError::InvalidProfile(_)), "got {err:?}");
}

#[tokio::test]
async fn messaging_only_user_can_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ibmmq/rest/v2/admin/qmgr/QM1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let adapter = IbmMqAdapter::new(settings());
    adapter.connect(&params(&server, &[])).await.unwrap();
    assert!(adapter.is_connected());
}

#[tokio::test]
async fn list_queues_hides_system_queues() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "qlocal", "name": "*"}),
        mqsc_ok(vec![
            json!({"queue": "SYSTEM.DEFAULT.LOCAL.QUEUE", "curdepth": 0}),
            json!({"queue": "DEV.Q2", "curdepth": 1}),
            json!({"queue": "DEV.Q1", "curdepth": "3"}),
        ]),
    )
    .await;

    let queues = adapter.list_queues(None).await.unwrap();
    let names: Vec<_> = queues.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, ["DEV.Q1", "DEV.Q2"]);
    assert_eq!(queues[0].depth, Some(3));
}

#[tokio::test]
async fn denied_discovery_probes_known_queues() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &["DEV.Q1", "DEV.MISSING"]).await;
    Mock::given(method("POST"))
        .and(path(MQSC))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_message_list(&server, &["414d01", "414d02"]).await;
    Mock::given(method("GET"))
        .and(path("/ibmmq/rest/v2/messaging/qmgr/QM1/queue/DEV.MISSING/messagelist"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let queues = adapter.list_queues(None).await.unwrap();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].name, "DEV.Q1");
    assert_eq!(queues[0].depth, Some(2));
    assert_eq!(adapter.get_queue_depth("DEV.Q1").await.unwrap(), 2);
}

#[tokio::test]
async fn reason_2085_is_object_not_found() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(&server, json!({"name": "NOPE"}), mqsc_failed(2085)).await;
    let err = adapter.get_queue_properties("NOPE").await.unwrap_err();
    assert!(
        matches!(err, MqError::ObjectNotFound { kind: ObjectKind::Queue, ref name } if name == "NOPE"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn queue_properties_read_mqsc_attributes() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "qlocal", "name": "DEV.Q1"}),
        mqsc_ok(vec![json!({
            "queue": "DEV.Q1",
            "curdepth": 3,
            "maxdepth": 5000,
            "defpsist": "YES",
            "ipprocs": 1,
            "descr": "orders"
        })]),
    )
    .await;
    let props = adapter.get_queue_properties("DEV.Q1").await.unwrap();
    assert_eq!(props.depth, Some(3));
    assert_eq!(props.max_depth, Some(5000));
    assert_eq!(props.durable, Some(true));
    assert_eq!(props.consumer_count, Some(1));
    assert_eq!(props.description.as_deref(), Some("orders"));
}

#[tokio::test]
async fn browse_reads_only_the_window() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_message_list(&server, &["A1", "B2", "C3"]).await;
    for (id, body) in [("B2", "second"), ("C3", "third")] {
        Mock::given(method("GET"))
            .and(path(format!("{QUEUE}/message")))
            .and(query_param("messageId", id))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ibm-mq-md-messageId", id)
                    .insert_header("ibm-mq-usr-region", "\"eu\"")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let page = adapter
        .browse_messages("DEV.Q1", &BrowseOptions::new(2, 1))
        .await
        .unwrap();
    let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["B2", "C3"]);
    assert_eq!(page[1].payload, b"third");
    assert_eq!(page[0].properties["region"], json!("eu"));
    assert!(page[0].correlation_id.is_none());
}

#[tokio::test]
async fn delete_is_a_destructive_get_by_id() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{QUEUE}/message")))
        .and(query_param("messageId", "B2"))
        .and(header("ibm-mq-rest-csrf-token", "mqlens"))
        .respond_with(ResponseTemplate::new(200).set_body_string("second"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{QUEUE}/message")))
        .and(query_param("messageId", "ZZ"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    adapter.delete_message("DEV.Q1", "B2").await.unwrap();
    let err = adapter.delete_message("DEV.Q1", "ZZ").await.unwrap_err();
    assert!(matches!(
        err,
        MqError::ObjectNotFound {
            kind: ObjectKind::Message,
            ..
        }
    ));

    let err = adapter
        .delete_messages("DEV.Q1", &["B2".into(), "ZZ".into()])
        .await
        .unwrap_err();
    assert!(
        matches!(err, MqError::PartialFailure { requested: 2, removed: 1, ref missing } if missing == &["ZZ".to_string()]),
        "got {err:?}"
    );
}

#[tokio::test]
async fn put_sends_properties_as_headers() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    Mock::given(method("POST"))
        .and(path(format!("{QUEUE}/message")))
        .and(header("ibm-mq-usr-region", "\"eu\""))
        .and(header("ibm-mq-md-correlationid", "c-1"))
        .and(header("content-type", "text/plain;charset=utf-8"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let props = [
        ("region".to_string(), json!("eu")),
        ("correlationId".to_string(), json!("c-1")),
    ]
    .into_iter()
    .collect();
    adapter
        .put_message("DEV.Q1", b"hello", Some(&props))
        .await
        .unwrap();
}

#[tokio::test]
async fn clear_falls_back_when_queue_is_open() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "clear", "qualifier": "qlocal", "name": "DEV.Q1"}),
        mqsc_failed(2042),
    )
    .await;
    mount_message_list(&server, &["A1", "B2"]).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{QUEUE}/message")))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .expect(2)
        .mount(&server)
        .await;

    adapter.clear_queue("DEV.Q1").await.unwrap();
}

#[tokio::test]
async fn clear_uses_mqsc_when_possible() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    Mock::given(method("POST"))
        .and(path(MQSC))
        .and(body_partial_json(json!({"command": "clear", "name": "DEV.Q1"})))
        .respond_with(mqsc_ok(vec![]))
        .expect(1)
        .mount(&server)
        .await;
    adapter.clear_queue("DEV.Q1").await.unwrap();
}

#[tokio::test]
async fn topics_list_and_publish_by_topic_string() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "topic", "name": "*"}),
        mqsc_ok(vec![
            json!({"topic": "PRICES", "topicstr": "prices/fx"}),
            json!({"topic": "SYSTEM.BASE.TOPIC", "topicstr": ""}),
        ]),
    )
    .await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "topic", "name": "PRICES"}),
        mqsc_ok(vec![json!({"topic": "PRICES", "topicstr": "prices/fx"})]),
    )
    .await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "tpstatus", "name": "prices/fx"}),
        mqsc_ok(vec![json!({"topicstr": "prices/fx", "subcount": 2})]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/ibmmq/rest/v2/messaging/qmgr/QM1/topic/prices%2Ffx/message"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let topics = adapter.topics().unwrap();
    let listed = topics.list_topics(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].topic_string.as_deref(), Some("prices/fx"));

    let props = topics.get_topic_properties("PRICES").await.unwrap();
    assert_eq!(props.subscription_count, Some(2));

    topics.publish_message("PRICES", b"1.08", None).await.unwrap();
}

#[tokio::test]
async fn channel_start_is_idempotent() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "channel", "name": "TO.QM2"}),
        mqsc_ok(vec![json!({"channel": "TO.QM2", "chltype": "SDR", "conname": "qm2(1414)"})]),
    )
    .await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "chstatus", "name": "TO.QM2"}),
        mqsc_ok(vec![json!({"channel": "TO.QM2", "status": "RUNNING"})]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(MQSC))
        .and(body_partial_json(json!({"command": "start"})))
        .respond_with(mqsc_ok(vec![]))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MQSC))
        .and(body_partial_json(json!({"command": "stop", "name": "TO.QM2"})))
        .respond_with(mqsc_ok(vec![]))
        .expect(1)
        .mount(&server)
        .await;

    let channels = adapter.channels().unwrap();
    let props = channels.get_channel_properties("TO.QM2").await.unwrap();
    assert_eq!(props.status, ChannelStatus::Running);
    assert_eq!(props.connection_name.as_deref(), Some("qm2(1414)"));

    channels.start_channel("TO.QM2").await.unwrap();
    channels.stop_channel("TO.QM2").await.unwrap();
}

#[tokio::test]
async fn stopping_inactive_channel_is_a_no_op() {
    let server = MockServer::start().await;
    let adapter = connected(&server, &[]).await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "channel", "name": "IDLE"}),
        mqsc_ok(vec![json!({"channel": "IDLE", "chltype": "SDR"})]),
    )
    .await;
    mount_mqsc(
        &server,
        json!({"command": "display", "qualifier": "chstatus", "name": "IDLE"}),
        mqsc_failed(3065),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(MQSC))
        .and(body_partial_json(json!({"command": "stop"})))
        .respond_with(mqsc_ok(vec![]))
        .expect(0)
        .mount(&server)
        .await;

    adapter.channels().unwrap().stop_channel("IDLE").await.unwrap();
}
