// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RestClient behaviour against a mock HTTP server.

use std::time::Duration;

use mqlens_core::MqError;
use mqlens_http::{Method, RestClient, Target};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RestClient {
    RestClient::builder(server.uri())
        .basic_auth(Some("guest"), Some("guest"))
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

#[tokio::test]
async fn sends_basic_auth_and_decodes_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/overview"))
        .and(header("authorization", "Basic Z3Vlc3Q6Z3Vlc3Q="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let c = client(&server);
    let req = c.request(Method::GET, c.url(&["api", "overview"]));
    let body: serde_json::Value = c.send_json(req, &Target::queue("-")).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn statuses_map_to_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/denied"))
        .respond_with(ResponseTemplate::new(403).set_body_string("access refused"))
        .mount(&server)
        .await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let c = client(&server);
    let send = |p: &'static str| {
        let c = c.clone();
        async move {
            c.send(c.request(Method::GET, c.url(&[p])), &Target::queue("orders"))
                .await
                .unwrap_err()
        }
    };

    assert!(matches!(
        send("missing").await,
        MqError::ObjectNotFound { name, .. } if name == "orders"
    ));
    assert!(matches!(
        send("denied").await,
        MqError::AuthorizationDenied(detail) if detail.contains("access refused")
    ));
    assert!(matches!(send("broken").await, MqError::Transport { .. }));
}

#[tokio::test]
async fn idempotent_requests_retry_transient_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let c = client(&server);
    let resp = c
        .send_idempotent(c.request(Method::GET, c.url(&["flaky"])), &Target::queue("q"))
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn slow_responses_become_timeouts() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let c = client(&server);
    let err = c
        .send(c.request(Method::GET, c.url(&["slow"])), &Target::queue("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, MqError::Timeout { .. }));
}
