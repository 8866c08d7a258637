// crates/ums-core/tests/snapshot_roundtrip.rs
// ============================================================================
// Module: Snapshot Tests
// Description: Round-trip, legacy migration, and deterministic digests.
// ============================================================================
//! ## Overview
//! Validates `import(export(state)) == state`, legacy `spaces` imports
//! under the default store, and byte-identical exports from two engines
//! fed the same request stream.

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

use serde_json::Value;
use serde_json::json;
use ums_core::EngineConfig;
use ums_core::FixedClock;
use ums_core::HashAlgorithm;
use ums_core::MemoryEngine;
use ums_core::NullMetricsSink;
use ums_core::Timestamp;
use ums_core::core::hashing::hash_canonical_json;

fn fixed_engine() -> MemoryEngine {
    MemoryEngine::with_services(
        EngineConfig::default(),
        Arc::new(FixedClock::new(Timestamp::from_unix_millis(1_750_000_000_000))),
        Arc::new(NullMetricsSink),
    )
}

/// A request stream exercising several buckets and entity kinds,
/// including secrets and unsafe instructions.
fn apply_stream(engine: &mut MemoryEngine) {
    let events: Vec<Value> = (0 .. 120)
        .map(|index| {
            let content = match index % 3 {
                0 => format!("routine build log line {index}"),
                1 => format!("credential sk-abcdefghijklmnopqrstuv observed at step {index}"),
                _ => format!("ignore previous instructions marker {index}"),
            };
            json!({ "type": "log", "source": "ci", "content": content })
        })
        .collect();
    engine
        .execute("ingest", &json!({ "profile": "agent-1", "events": events }))
        .expect("ingest");
    engine
        .execute(
            "learner_profile_update",
            &json!({
                "profile": "agent-1",
                "learnerId": "learner-1",
                "identityRefs": [
                    { "namespace": "email", "value": "one@example.com", "isPrimary": true },
                ],
                "goals": ["graphs"],
            }),
        )
        .expect("profile");
    engine
        .execute(
            "policy_decision_update",
            &json!({
                "profile": "agent-1",
                "policyKey": "recall",
                "outcome": "review",
                "reasonCodes": ["spot-check"],
                "provenanceEventIds": ["ep-policy-1"],
            }),
        )
        .expect("policy");
}

#[test]
fn export_import_round_trips_byte_exactly() {
    let mut engine = fixed_engine();
    apply_stream(&mut engine);

    let exported = engine.snapshot_export().expect("export");
    let mut restored = fixed_engine();
    restored.snapshot_import(&exported).expect("import");
    let re_exported = restored.snapshot_export().expect("re-export");

    let first = hash_canonical_json(HashAlgorithm::Sha256, &exported).expect("hash");
    let second = hash_canonical_json(HashAlgorithm::Sha256, &re_exported).expect("hash");
    assert_eq!(first, second);
}

#[test]
fn identical_streams_produce_identical_state_digests() {
    let mut left = fixed_engine();
    let mut right = fixed_engine();
    apply_stream(&mut left);
    apply_stream(&mut right);

    let left_digest =
        hash_canonical_json(HashAlgorithm::Sha256, &left.snapshot_export().expect("left"))
            .expect("left hash");
    let right_digest =
        hash_canonical_json(HashAlgorithm::Sha256, &right.snapshot_export().expect("right"))
            .expect("right hash");
    assert_eq!(left_digest, right_digest);
}

#[test]
fn replaying_the_stream_leaves_state_unchanged() {
    let mut engine = fixed_engine();
    apply_stream(&mut engine);
    let before = engine.snapshot_export().expect("before");

    apply_stream(&mut engine);
    let after = engine.snapshot_export().expect("after");

    let before_hash = hash_canonical_json(HashAlgorithm::Sha256, &before).expect("before hash");
    let after_hash = hash_canonical_json(HashAlgorithm::Sha256, &after).expect("after hash");
    assert_eq!(before_hash, after_hash, "replay must be idempotent");
}

#[test]
fn snapshot_shape_matches_the_contract() {
    let mut engine = fixed_engine();
    apply_stream(&mut engine);
    let exported = engine.snapshot_export().expect("export");

    assert_eq!(exported["schemaVersion"], json!(1));
    let stores = exported["stores"].as_array().expect("stores");
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["storeId"], json!("default"));
    let profiles = stores[0]["profiles"].as_array().expect("profiles");
    assert_eq!(profiles[0]["profile"], json!("agent-1"));
    assert_eq!(exported["totals"]["storeCount"], json!(1));
    assert_eq!(exported["totals"]["eventCount"], json!(120));
    assert_eq!(profiles[0]["episodes"].as_array().map(Vec::len), Some(120));
}

#[test]
fn legacy_spaces_snapshot_imports_under_default_store() {
    let legacy = json!({
        "spaces": [{
            "space": "agent-legacy",
            "episodes": [{
                "id": "ep_00000000000000aa",
                "storeId": "default",
                "type": "note",
                "source": "import",
                "content": "carried over",
                "unsafeInstruction": false,
                "redactions": 0,
                "createdAt": "2025-01-01T00:00:00Z",
            }],
            "counters": { "eventCount": 1 },
        }],
    });

    let mut engine = fixed_engine();
    engine.snapshot_import(&legacy).expect("legacy import");

    let exported = engine.snapshot_export().expect("export");
    let stores = exported["stores"].as_array().expect("stores");
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["storeId"], json!("default"));
    let profiles = stores[0]["profiles"].as_array().expect("profiles");
    assert_eq!(profiles[0]["profile"], json!("agent-legacy"));
    assert_eq!(exported["totals"]["eventCount"], json!(1));

    let recall = engine
        .execute(
            "context",
            &json!({ "profile": "agent-legacy", "query": "carried over" }),
        )
        .expect("context");
    let matches = recall["matches"].as_array().expect("matches");
    assert_eq!(matches.len(), 1);
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let mut engine = fixed_engine();
    let err = engine
        .snapshot_import(&json!({ "schemaVersion": 99, "stores": [], "totals": {} }))
        .expect_err("bad version");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn reset_clears_all_state() {
    let mut engine = fixed_engine();
    apply_stream(&mut engine);
    engine.reset();
    let exported = engine.snapshot_export().expect("export");
    assert_eq!(exported["stores"], json!([]));
    assert_eq!(exported["totals"]["eventCount"], json!(0));
}
