// crates/ums-server/tests/http.rs
// ============================================================================
// Module: Server Tests
// Description: Header injection, status mapping, and router wiring.
// ============================================================================
//! ## Overview
//! Validates the store-header injection rules, the taxonomy-to-status
//! mapping, and end-to-end routing through a bound listener.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use ums_core::EngineConfig;
use ums_core::MemoryEngine;
use ums_server::STORE_HEADER;
use ums_server::ServerState;
use ums_server::build_router;
use ums_server::inject_store_header;
use ums_server::status_for_code;

#[test]
fn header_injects_store_when_body_omits_it() {
    let mut headers = HeaderMap::new();
    headers.insert(STORE_HEADER, HeaderValue::from_static("jira-history"));
    let body = json!({ "profile": "shared-profile" });
    let injected = inject_store_header(body, &headers);
    assert_eq!(injected["storeId"], json!("jira-history"));
}

#[test]
fn header_never_overrides_an_explicit_store() {
    let mut headers = HeaderMap::new();
    headers.insert(STORE_HEADER, HeaderValue::from_static("jira-history"));
    let body = json!({ "profile": "shared-profile", "storeId": "coding-agent" });
    let injected = inject_store_header(body, &headers);
    assert_eq!(injected["storeId"], json!("coding-agent"));
}

#[test]
fn missing_header_leaves_body_untouched() {
    let headers = HeaderMap::new();
    let body = json!({ "profile": "shared-profile" });
    let injected = inject_store_header(body.clone(), &headers);
    assert_eq!(injected, body);
}

#[test]
fn taxonomy_codes_map_onto_http_statuses() {
    assert_eq!(status_for_code("NOT_FOUND"), StatusCode::NOT_FOUND);
    assert_eq!(status_for_code("CONFLICT"), StatusCode::CONFLICT);
    assert_eq!(
        status_for_code("CONTRACT_VIOLATION"),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(status_for_code("VALIDATION_FAILED"), StatusCode::BAD_REQUEST);
    assert_eq!(status_for_code("EVIDENCE_REQUIRED"), StatusCode::BAD_REQUEST);
    assert_eq!(status_for_code("ISOLATION_VIOLATION"), StatusCode::BAD_REQUEST);
}

/// Sends one HTTP request to a bound router and returns the raw
/// response text.
async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn ingest_round_trips_over_http() {
    let state = ServerState::new(MemoryEngine::new(EngineConfig::default()));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    let body = json!({
        "profile": "agent-http",
        "events": [{ "type": "note", "content": "served over http" }],
    })
    .to_string();
    let request = format!(
        "POST /v1/operations/ingest HTTP/1.1\r\nhost: localhost\r\n\
         content-type: application/json\r\ncontent-length: {}\r\n\
         connection: close\r\n\r\n{body}",
        body.len()
    );
    let response = raw_request(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 200"), "response: {response}");
    let json_start = response.find("\r\n\r\n").expect("body separator");
    let payload: Value =
        serde_json::from_str(response[json_start ..].trim()).expect("json body");
    assert_eq!(payload["accepted"], json!(1));
    assert_eq!(payload["storeId"], json!("default"));
}

#[tokio::test]
async fn evidence_failures_surface_as_bad_request() {
    let state = ServerState::new(MemoryEngine::new(EngineConfig::default()));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    let body = json!({
        "profile": "learner-http",
        "misconceptionKey": "missing-evidence",
        "signal": "harmful",
    })
    .to_string();
    let request = format!(
        "POST /v1/operations/misconception_update HTTP/1.1\r\nhost: localhost\r\n\
         content-type: application/json\r\ncontent-length: {}\r\n\
         connection: close\r\n\r\n{body}",
        body.len()
    );
    let response = raw_request(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 400"), "response: {response}");
    assert!(response.contains("EVIDENCE_REQUIRED"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let state = ServerState::new(MemoryEngine::new(EngineConfig::default()));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    let response = raw_request(
        addr,
        "GET /v1/health HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "response: {response}");
    assert!(response.contains("\"status\":\"ok\""));
}
