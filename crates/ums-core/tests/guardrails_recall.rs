// crates/ums-core/tests/guardrails_recall.rs
// ============================================================================
// Module: Guardrail Tests
// Description: Recall truncation, evidence requirements, payload budgets.
// ============================================================================
//! ## Overview
//! Validates bounded recall packs (item count and token budget),
//! evidence-required rejections, and the policy-exception escape hatch.

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

#[test]
fn recall_respects_max_items_and_token_budget() {
    let mut engine = fixed_engine();
    let events: Vec<serde_json::Value> = (0 .. 150)
        .map(|index| {
            json!({
                "type": "note",
                "source": "codex",
                "content": format!("workload observation entry number {index}"),
            })
        })
        .collect();
    let ingest = engine
        .execute("ingest", &json!({ "profile": "agent-1", "events": events }))
        .expect("ingest");
    assert_eq!(ingest["accepted"], json!(150));

    let response = engine
        .execute(
            "context",
            &json!({
                "profile": "agent-1",
                "query": "",
                "maxItems": 6,
                "tokenBudget": 120,
            }),
        )
        .expect("context");
    let items = response["items"].as_array().expect("items");
    assert!(items.len() <= 6, "items: {}", items.len());
    let estimated = response["estimatedTokens"].as_u64().expect("tokens");
    assert!(estimated <= 120, "estimatedTokens: {estimated}");
    assert_eq!(response["truncated"], json!(true));
}

#[test]
fn recall_with_zero_max_items_returns_nothing() {
    let mut engine = fixed_engine();
    engine
        .execute(
            "ingest",
            &json!({
                "profile": "agent-1",
                "events": [{ "type": "note", "content": "solitary entry" }],
            }),
        )
        .expect("ingest");

    let response = engine
        .execute(
            "context",
            &json!({ "profile": "agent-1", "query": "", "maxItems": 0 }),
        )
        .expect("context");
    assert_eq!(response["items"], json!([]));
    assert_eq!(response["matches"], json!([]));
}

#[test]
fn misconception_without_evidence_is_rejected() {
    let mut engine = fixed_engine();
    let envelope = engine.execute_envelope(
        "misconception_update",
        &json!({
            "profile": "learner-cli-guardrail",
            "misconceptionKey": "missing-evidence-pointer",
            "signal": "harmful",
        }),
    );
    assert_eq!(envelope["ok"], json!(false));
    assert_eq!(envelope["error"]["code"], json!("EVIDENCE_REQUIRED"));
    let message = envelope["error"]["message"].as_str().expect("message").to_lowercase();
    assert!(message.contains("evidenceeventid"), "message: {message}");
}

#[test]
fn policy_exception_waives_evidence_requirement() {
    let mut engine = fixed_engine();
    let response = engine
        .execute(
            "misconception_update",
            &json!({
                "profile": "learner-cli-guardrail",
                "misconceptionKey": "approved-gap",
                "signal": "observed",
                "metadata": { "policyException": { "approvedBy": "governance" } },
            }),
        )
        .expect("policy exception path");
    assert_eq!(response["action"], json!("created"));
}

#[test]
fn export_playbook_is_bounded() {
    let mut engine = fixed_engine();
    let events: Vec<serde_json::Value> = (0 .. 40)
        .map(|index| json!({ "type": "note", "content": format!("evidence item {index}") }))
        .collect();
    engine
        .execute("ingest", &json!({ "profile": "agent-1", "events": events }))
        .expect("ingest");

    let response = engine
        .execute(
            "export",
            &json!({ "profile": "agent-1", "tokenBudget": 100 }),
        )
        .expect("export");
    let estimated = response["estimatedTokens"].as_u64().expect("tokens");
    assert!(estimated <= 100, "estimatedTokens: {estimated}");
    assert!(response["playbook"]["counts"]["episodes"].as_u64() >= Some(40));
}

#[test]
fn context_meta_echoes_scope_and_digest() {
    let mut engine = fixed_engine();
    let response = engine
        .execute(
            "context",
            &json!({ "profile": "agent-1", "query": "anything" }),
        )
        .expect("context");
    assert_eq!(response["operation"], json!("context"));
    assert_eq!(response["storeId"], json!("default"));
    assert_eq!(response["profile"], json!("agent-1"));
    assert_eq!(response["action"], json!("noop"));
    let digest = response["requestDigest"].as_str().expect("digest");
    assert_eq!(digest.len(), 64);
}
