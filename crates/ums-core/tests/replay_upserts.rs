// crates/ums-core/tests/replay_upserts.rs
// ============================================================================
// Module: Replay Upsert Tests
// Description: Replay-safe noops for learner, identity, and misconception upserts.
// ============================================================================
//! ## Overview
//! Resubmitting semantically identical upserts must yield `noop` with
//! identical identifiers, regardless of list-attribute ordering.

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
fn learner_profile_update_is_replay_safe_across_goal_order() {
    let mut engine = fixed_engine();
    let first_request = json!({
        "storeId": "tenant-cli",
        "profile": "learner-cli",
        "learnerId": "learner-88",
        "identityRefs": [
            { "namespace": "email", "value": "learner88@example.com", "isPrimary": true },
        ],
        "goals": ["dp", "graph"],
        "evidenceEventIds": ["ep-profile-cli-1"],
    });
    let first = engine
        .execute("learner_profile_update", &first_request)
        .expect("first upsert");
    assert_eq!(first["action"], json!("created"));
    assert_eq!(first["version"], json!(1));
    let profile_id = first["profileId"].as_str().expect("profileId").to_string();

    let second_request = json!({
        "storeId": "tenant-cli",
        "profile": "learner-cli",
        "learnerId": "learner-88",
        "identityRefs": [
            { "namespace": "email", "value": "learner88@example.com", "isPrimary": true },
        ],
        "goals": ["graph", "dp"],
        "evidenceEventIds": ["ep-profile-cli-1"],
    });
    let second = engine
        .execute("learner_profile_update", &second_request)
        .expect("second upsert");
    assert_eq!(second["action"], json!("noop"));
    assert_eq!(second["profileId"], json!(profile_id));
    assert_eq!(second["version"], json!(1));
}

#[test]
fn learner_profile_real_change_bumps_version() {
    let mut engine = fixed_engine();
    let base = json!({
        "profile": "learner-1",
        "learnerId": "learner-9",
        "identityRefs": [{ "namespace": "email", "value": "nine@example.com", "isPrimary": true }],
        "goals": ["dp"],
    });
    engine.execute("learner_profile_update", &base).expect("create");

    let grown = json!({
        "profile": "learner-1",
        "learnerId": "learner-9",
        "identityRefs": [{ "namespace": "email", "value": "nine@example.com", "isPrimary": true }],
        "goals": ["dp", "recursion"],
    });
    let updated = engine.execute("learner_profile_update", &grown).expect("update");
    assert_eq!(updated["action"], json!("updated"));
    assert_eq!(updated["version"], json!(2));
}

#[test]
fn learner_profile_requires_exactly_one_primary_ref() {
    let mut engine = fixed_engine();
    let none_primary = json!({
        "profile": "learner-1",
        "learnerId": "learner-11",
        "identityRefs": [{ "namespace": "email", "value": "a@example.com" }],
    });
    let err = engine
        .execute("learner_profile_update", &none_primary)
        .expect_err("no primary");
    assert_eq!(err.code(), "IDENTITY_INVARIANT");

    let two_primary = json!({
        "profile": "learner-1",
        "learnerId": "learner-12",
        "identityRefs": [
            { "namespace": "email", "value": "a@example.com", "isPrimary": true },
            { "namespace": "github", "value": "a", "isPrimary": true },
        ],
    });
    let err = engine
        .execute("learner_profile_update", &two_primary)
        .expect_err("two primaries");
    assert_eq!(err.code(), "IDENTITY_INVARIANT");
}

#[test]
fn identity_edges_reject_degenerate_endpoints() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "edges": [{
            "relation": "same_as",
            "fromRef": "email:a@example.com",
            "toRef": "email:a@example.com",
        }],
    });
    let err = engine.execute("identity_graph_update", &request).expect_err("loop edge");
    assert_eq!(err.code(), "IDENTITY_INVARIANT");
}

#[test]
fn evidence_bearing_edges_require_pointers() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "edges": [{
            "relation": "misconception_of",
            "fromRef": "concept:recursion",
            "toRef": "concept:iteration",
        }],
    });
    let err = engine.execute("identity_graph_update", &request).expect_err("no evidence");
    assert_eq!(err.code(), "EVIDENCE_REQUIRED");
}

#[test]
fn identity_edge_upsert_is_replay_safe() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "edges": [{
            "relation": "alias_of",
            "fromRef": "github:learner88",
            "toRef": "email:learner88@example.com",
        }],
    });
    let first = engine.execute("identity_graph_update", &request).expect("first");
    assert_eq!(first["created"], json!(1));

    let second = engine.execute("identity_graph_update", &request).expect("second");
    assert_eq!(second["noops"], json!(1));
    assert_eq!(second["action"], json!("noop"));
    assert_eq!(second["edgeIds"], first["edgeIds"]);
}

#[test]
fn misconception_replay_with_same_request_is_noop() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "misconceptionKey": "off-by-one",
        "signal": "harmful",
        "evidenceEventIds": ["ep-evidence-1"],
    });
    let first = engine.execute("misconception_update", &request).expect("first");
    assert_eq!(first["action"], json!("created"));
    assert_eq!(first["harmfulSignalCount"], json!(1));

    let second = engine.execute("misconception_update", &request).expect("second");
    assert_eq!(second["action"], json!("noop"));
    assert_eq!(second["harmfulSignalCount"], json!(1));
}

#[test]
fn distinct_signals_accumulate_counts() {
    let mut engine = fixed_engine();
    let first = json!({
        "profile": "learner-1",
        "misconceptionKey": "off-by-one",
        "signal": "harmful",
        "evidenceEventIds": ["ep-evidence-1"],
        "sourceSignalIds": ["sig-1"],
    });
    let second = json!({
        "profile": "learner-1",
        "misconceptionKey": "off-by-one",
        "signal": "harmful",
        "evidenceEventIds": ["ep-evidence-2"],
        "sourceSignalIds": ["sig-2"],
    });
    engine.execute("misconception_update", &first).expect("first");
    let response = engine.execute("misconception_update", &second).expect("second");
    assert_eq!(response["harmfulSignalCount"], json!(2));
}
