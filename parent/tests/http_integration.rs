// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP integration tests for the relay API.
//!
//! These tests use `axum-test` to exercise the full request/response cycle
//! through the Axum router with all middleware applied.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Bytes;
use axum_test::TestServer;
use enclave_common::codec::{Request, encode};
use parent_relay::application::create_router;
use parent_relay::configuration::RelayOptions;
use parent_relay::constants::MAX_BODY_SIZE;
use parent_relay::enclaves::Enclaves;

/// Test server with default options: discovery upstream, no enclaves known.
fn create_test_server(options: RelayOptions) -> TestServer {
    let enclaves = Arc::new(Enclaves::new(options.enclave_name.clone()));
    let app = create_router(options, enclaves).unwrap();
    TestServer::new(app).unwrap()
}

fn attestation_request() -> serde_json::Value {
    let payload = String::from_utf8(encode(&Request::get_attestation()).unwrap()).unwrap();
    serde_json::json!({ "payload": payload })
}

#[tokio::test]
async fn test_health_endpoint_returns_status_ok_body() {
    let server = create_test_server(RelayOptions::default());
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_enclaves_endpoint_returns_empty_array() {
    let server = create_test_server(RelayOptions::default());
    let response = server.get("/enclaves").await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!([]));
}

#[tokio::test]
async fn test_post_without_enclave_returns_503() {
    let server = create_test_server(RelayOptions::default());
    let response = server.post("/post").json(&attestation_request()).await;
    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 503);
    assert_eq!(body["message"], "Cannot find an enclave to connect to");
}

#[tokio::test]
async fn test_post_with_unreachable_enclave_returns_502() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let server = create_test_server(RelayOptions {
        enclave_host: Some("127.0.0.1".to_string()),
        enclave_port: u32::from(port),
        ..RelayOptions::default()
    });
    let response = server.post("/post").json(&attestation_request()).await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 502);
}

#[tokio::test]
async fn test_post_with_invalid_json_returns_400() {
    let server = create_test_server(RelayOptions::default());
    let response = server
        .post("/post")
        .content_type("application/json")
        .bytes(Bytes::from("{invalid json"))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_post_with_empty_payload_returns_400() {
    let server = create_test_server(RelayOptions::default());
    let response = server
        .post("/post")
        .json(&serde_json::json!({"payload": ""}))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_post_with_non_envelope_payload_returns_400() {
    let server = create_test_server(RelayOptions::default());
    let response = server
        .post("/post")
        .json(&serde_json::json!({"payload": "aGVsbG8gd29ybGQ="}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_oversized_request_body_returns_413() {
    let server = create_test_server(RelayOptions::default());
    let oversized_body = vec![b'a'; MAX_BODY_SIZE + 1];
    let response = server
        .post("/post")
        .content_type("application/json")
        .bytes(Bytes::from(oversized_body))
        .await;
    response.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_conflicting_upstreams_fail_router_creation() {
    let options = RelayOptions {
        cid: Some(16),
        enclave_host: Some("127.0.0.1".to_string()),
        ..RelayOptions::default()
    };
    let enclaves = Arc::new(Enclaves::new(options.enclave_name.clone()));
    assert!(create_router(options, enclaves).is_err());
}
