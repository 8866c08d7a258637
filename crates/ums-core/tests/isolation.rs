// crates/ums-core/tests/isolation.rs
// ============================================================================
// Module: Isolation Tests
// Description: Store-boundary enforcement for ingestion and recall.
// ============================================================================
//! ## Overview
//! Entities ingested under one store must never surface through another
//! store's recall, even under the same profile name, unless the request
//! carries an allowlist and the cross-space guardrail is enabled.

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

use std::sync::Arc;

use serde_json::json;
use ums_core::EngineConfig;
use ums_core::FixedClock;
use ums_core::MemoryEngine;
use ums_core::NullMetricsSink;
use ums_core::Timestamp;

fn fixed_engine() -> MemoryEngine {
    MemoryEngine::with_services(
        EngineConfig::default(),
        Arc::new(FixedClock::new(Timestamp::from_unix_millis(1_750_000_000_000))),
        Arc::new(NullMetricsSink),
    )
}

fn seed_two_stores(engine: &mut MemoryEngine) {
    let jira = json!({
        "storeId": "jira-history",
        "profile": "shared-profile",
        "events": [{ "type": "ticket", "source": "jira", "content": "jira only note" }],
    });
    let response = engine.execute("ingest", &jira).expect("jira ingest");
    assert_eq!(response["accepted"], json!(1));
    assert_eq!(response["duplicates"], json!(0));

    let coding = json!({
        "storeId": "coding-agent",
        "profile": "shared-profile",
        "events": [{ "type": "note", "source": "codex", "content": "coding only note" }],
    });
    let response = engine.execute("ingest", &coding).expect("coding ingest");
    assert_eq!(response["accepted"], json!(1));
}

#[test]
fn context_never_crosses_store_boundaries() {
    let mut engine = fixed_engine();
    seed_two_stores(&mut engine);

    let from_jira = engine
        .execute(
            "context",
            &json!({
                "storeId": "jira-history",
                "profile": "shared-profile",
                "query": "coding only note",
            }),
        )
        .expect("jira context");
    assert_eq!(from_jira["matches"], json!([]));

    let from_coding = engine
        .execute(
            "context",
            &json!({
                "storeId": "coding-agent",
                "profile": "shared-profile",
                "query": "jira only note",
            }),
        )
        .expect("coding context");
    assert_eq!(from_coding["matches"], json!([]));
}

#[test]
fn context_finds_content_in_its_own_store() {
    let mut engine = fixed_engine();
    seed_two_stores(&mut engine);

    let response = engine
        .execute(
            "context",
            &json!({
                "storeId": "jira-history",
                "profile": "shared-profile",
                "query": "jira only note",
            }),
        )
        .expect("context");
    let matches = response["matches"].as_array().expect("matches");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["snippet"], json!("jira only note"));
}

#[test]
fn cross_store_read_without_allowlist_is_rejected() {
    let mut engine = fixed_engine();
    seed_two_stores(&mut engine);

    let err = engine
        .execute(
            "context",
            &json!({
                "storeId": "jira-history",
                "profile": "shared-profile",
                "query": "note",
                "targetStoreId": "coding-agent",
            }),
        )
        .expect_err("isolation");
    assert_eq!(err.code(), "ISOLATION_VIOLATION");
}

#[test]
fn allowlist_alone_is_not_enough_without_guardrail() {
    let mut engine = fixed_engine();
    seed_two_stores(&mut engine);

    let err = engine
        .execute(
            "context",
            &json!({
                "storeId": "jira-history",
                "profile": "shared-profile",
                "query": "note",
                "targetStoreId": "coding-agent",
                "allowStores": ["coding-agent"],
            }),
        )
        .expect_err("guardrail disabled");
    assert_eq!(err.code(), "ISOLATION_VIOLATION");
}

#[test]
fn allowlisted_cross_store_read_passes_when_enabled() {
    let mut config = EngineConfig::default();
    config.guardrails.allow_cross_space_read = true;
    let mut engine = MemoryEngine::with_services(
        config,
        Arc::new(FixedClock::new(Timestamp::from_unix_millis(1_750_000_000_000))),
        Arc::new(NullMetricsSink),
    );
    seed_two_stores(&mut engine);

    let response = engine
        .execute(
            "context",
            &json!({
                "storeId": "jira-history",
                "profile": "shared-profile",
                "query": "coding only note",
                "targetStoreId": "coding-agent",
                "allowStores": ["coding-agent"],
            }),
        )
        .expect("cross-store context");
    let matches = response["matches"].as_array().expect("matches");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["snippet"], json!("coding only note"));
}

#[test]
fn store_id_defaults_to_default_store() {
    let mut engine = fixed_engine();
    let response = engine
        .execute(
            "ingest",
            &json!({
                "profile": "agent-1",
                "events": [{ "type": "note", "content": "defaulted store" }],
            }),
        )
        .expect("ingest");
    assert_eq!(response["storeId"], json!("default"));
}
