// crates/ums-core/tests/policy.rs
// ============================================================================
// Module: Policy Tests
// Description: Decision upserts, escalation, authorization, degraded mode.
// ============================================================================
//! ## Overview
//! Validates the deny/reason-code contract, outcome escalation
//! (`allow < review < deny`), recall authorization evaluation, tutor
//! degradation from misconception harm, and the bounded policy audit
//! export.

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
fn deny_requires_reason_codes() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "policy_decision_update",
            &json!({
                "profile": "learner-1",
                "policyKey": "recall",
                "outcome": "deny",
                "provenanceEventIds": ["ep-policy-1"],
            }),
        )
        .expect_err("deny without reasons");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn decisions_require_provenance() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "policy_decision_update",
            &json!({
                "profile": "learner-1",
                "policyKey": "recall",
                "outcome": "allow",
            }),
        )
        .expect_err("missing provenance");
    assert_eq!(err.code(), "EVIDENCE_REQUIRED");
}

#[test]
fn outcomes_escalate_and_never_deescalate() {
    let mut engine = fixed_engine();
    let allow = json!({
        "profile": "learner-1",
        "policyKey": "recall",
        "outcome": "allow",
        "provenanceEventIds": ["ep-policy-1"],
    });
    let first = engine.execute("policy_decision_update", &allow).expect("allow");
    assert_eq!(first["outcome"], json!("allow"));
    let decision_id = first["decisionId"].as_str().expect("id").to_string();

    let deny = json!({
        "profile": "learner-1",
        "policyKey": "recall",
        "outcome": "deny",
        "reasonCodes": ["sensitive-content"],
        "provenanceEventIds": ["ep-policy-2"],
    });
    let second = engine.execute("policy_decision_update", &deny).expect("deny");
    assert_eq!(second["decisionId"], json!(decision_id), "same semantic key");
    assert_eq!(second["outcome"], json!("deny"));

    let soften = json!({
        "profile": "learner-1",
        "policyKey": "recall",
        "outcome": "allow",
        "provenanceEventIds": ["ep-policy-3"],
    });
    let third = engine.execute("policy_decision_update", &soften).expect("soften");
    assert_eq!(third["outcome"], json!("deny"), "outcomes never de-escalate");
}

#[test]
fn recall_authorization_reflects_stored_decisions() {
    let mut engine = fixed_engine();
    let open = engine
        .execute("recall_authorization", &json!({ "profile": "learner-1" }))
        .expect("open evaluation");
    assert_eq!(open["outcome"], json!("allow"));
    assert_eq!(open["consideredDecisionIds"], json!([]));

    engine
        .execute(
            "policy_decision_update",
            &json!({
                "profile": "learner-1",
                "policyKey": "recall",
                "outcome": "deny",
                "reasonCodes": ["sensitive-content"],
                "provenanceEventIds": ["ep-policy-1"],
            }),
        )
        .expect("deny");

    let denied = engine
        .execute("recall_authorization", &json!({ "profile": "learner-1" }))
        .expect("denied evaluation");
    assert_eq!(denied["outcome"], json!("deny"));
    assert_eq!(denied["reasonCodes"], json!(["sensitive-content"]));
    assert_eq!(denied["consideredDecisionIds"].as_array().map(Vec::len), Some(1));
    assert_eq!(denied["action"], json!("noop"), "evaluation without provenance is a read");
}

#[test]
fn recall_authorization_records_with_provenance() {
    let mut engine = fixed_engine();
    let response = engine
        .execute(
            "recall_authorization",
            &json!({
                "profile": "learner-1",
                "policyKey": "playbook",
                "provenanceEventIds": ["ep-eval-1"],
            }),
        )
        .expect("recorded evaluation");
    assert_eq!(response["action"], json!("created"));
    let recorded = response["recordedDecisionId"].as_str().expect("recorded id");
    assert!(recorded.starts_with("pol_"));
}

#[test]
fn tutor_degrades_after_harm_threshold() {
    let mut engine = fixed_engine();
    let fresh = engine
        .execute("tutor_degraded", &json!({ "profile": "learner-1" }))
        .expect("fresh");
    assert_eq!(fresh["degraded"], json!(false));
    assert_eq!(fresh["excludedMisconceptionKeys"], json!([]));

    for signal in 0 .. 3 {
        engine
            .execute(
                "misconception_update",
                &json!({
                    "profile": "learner-1",
                    "misconceptionKey": "unbounded-recursion",
                    "signal": "harmful",
                    "evidenceEventIds": [format!("ep-harm-{signal}")],
                    "sourceSignalIds": [format!("sig-{signal}")],
                }),
            )
            .expect("signal");
    }

    let degraded = engine
        .execute(
            "tutor_degraded",
            &json!({ "profile": "learner-1", "provenanceEventIds": ["ep-eval-1"] }),
        )
        .expect("degraded");
    assert_eq!(degraded["degraded"], json!(true));
    assert_eq!(
        degraded["excludedMisconceptionKeys"],
        json!(["unbounded-recursion"])
    );
    assert_eq!(degraded["reasonCodes"], json!(["harm_threshold"]));
    assert!(degraded["decisionId"].as_str().expect("decision").starts_with("pol_"));
}

#[test]
fn explicit_reason_degrades_tutoring() {
    let mut engine = fixed_engine();
    let response = engine
        .execute(
            "tutor_degraded",
            &json!({ "profile": "learner-1", "reason": "manual override" }),
        )
        .expect("explicit");
    assert_eq!(response["degraded"], json!(true));
    assert_eq!(response["reasonCodes"], json!(["explicit_reason"]));
}

#[test]
fn policy_audit_export_bundles_decisions_and_checks() {
    let mut engine = fixed_engine();
    engine
        .execute(
            "policy_decision_update",
            &json!({
                "profile": "learner-1",
                "policyKey": "recall",
                "outcome": "review",
                "reasonCodes": ["pending-approval"],
                "provenanceEventIds": ["ep-policy-1"],
            }),
        )
        .expect("decision");

    let response = engine
        .execute("policy_audit_export", &json!({ "profile": "learner-1" }))
        .expect("export");
    assert_eq!(response["decisions"].as_array().map(Vec::len), Some(1));
    assert_eq!(response["decisions"][0]["outcome"], json!("review"));
    let checks = response["checks"].as_array().expect("checks");
    assert!(!checks.is_empty());
    assert_eq!(response["truncated"], json!(false));
}

#[test]
fn policy_audit_export_truncates_to_budget() {
    let mut engine = fixed_engine();
    for index in 0 .. 20 {
        engine
            .execute(
                "policy_decision_update",
                &json!({
                    "profile": "learner-1",
                    "policyKey": format!("surface-{index}"),
                    "outcome": "review",
                    "reasonCodes": [format!("reason-code-number-{index}")],
                    "provenanceEventIds": [format!("ep-policy-{index}")],
                }),
            )
            .expect("decision");
    }

    let response = engine
        .execute(
            "policy_audit_export",
            &json!({ "profile": "learner-1", "tokenBudget": 150 }),
        )
        .expect("export");
    assert_eq!(response["truncated"], json!(true));
    let estimated = response["estimatedTokens"].as_u64().expect("tokens");
    assert!(estimated <= 150, "estimatedTokens: {estimated}");
}
