// crates/ums-core/tests/audit_doctor.rs
// ============================================================================
// Module: Audit and Doctor Tests
// Description: Invariant sweeps and engine diagnostics.
// ============================================================================
//! ## Overview
//! Validates that healthy buckets pass every audit check, that seeded
//! defects are reported, and that doctor mirrors counters, index sizes,
//! and guardrail configuration.

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

/// Seeds a healthy bucket: episodes, a curated rule, a profile.
fn seed_healthy(engine: &mut MemoryEngine) {
    let ingest = engine
        .execute(
            "ingest",
            &json!({
                "profile": "agent-1",
                "events": [
                    { "type": "note", "content": "observed retry pattern in deploys" },
                ],
            }),
        )
        .expect("ingest");
    let episode_id = ingest["episodeIds"][0].as_str().expect("episode").to_string();
    engine
        .execute(
            "curate",
            &json!({
                "profile": "agent-1",
                "candidates": [{
                    "statement": "Retry deploys once before alerting",
                    "confidence": 0.5,
                    "evidenceEpisodeIds": [episode_id],
                }],
            }),
        )
        .expect("curate");
    engine
        .execute(
            "learner_profile_update",
            &json!({
                "profile": "agent-1",
                "learnerId": "learner-1",
                "identityRefs": [
                    { "namespace": "email", "value": "one@example.com", "isPrimary": true },
                ],
            }),
        )
        .expect("profile");
}

#[test]
fn healthy_bucket_passes_every_check() {
    let mut engine = fixed_engine();
    seed_healthy(&mut engine);

    let response = engine
        .execute("audit", &json!({ "profile": "agent-1" }))
        .expect("audit");
    assert_eq!(response["status"], json!("pass"));
    let checks = response["checks"].as_array().expect("checks");
    assert_eq!(checks.len(), 6);
    for check in checks {
        assert_eq!(check["status"], json!("pass"), "check: {}", check["name"]);
        assert_eq!(check["details"], json!([]));
    }
}

#[test]
fn audit_can_run_a_subset_of_checks() {
    let mut engine = fixed_engine();
    seed_healthy(&mut engine);

    let response = engine
        .execute(
            "audit",
            &json!({ "profile": "agent-1", "checks": ["evidence_presence", "freshness"] }),
        )
        .expect("audit");
    let checks = response["checks"].as_array().expect("checks");
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0]["name"], json!("evidence_presence"));
    assert_eq!(checks[1]["name"], json!("freshness"));
}

#[test]
fn stale_rules_fail_the_freshness_check() {
    let mut engine = fixed_engine();
    seed_healthy(&mut engine);

    // Re-audit from a clock far past the freshness horizon.
    let mut late_engine = MemoryEngine::with_services(
        EngineConfig::default(),
        Arc::new(FixedClock::new(Timestamp::from_unix_millis(
            1_750_000_000_000 + 90 * 86_400_000,
        ))),
        Arc::new(NullMetricsSink),
    );
    late_engine
        .snapshot_import(&engine.snapshot_export().expect("export"))
        .expect("import");

    let response = late_engine
        .execute("audit", &json!({ "profile": "agent-1", "checks": ["freshness"] }))
        .expect("audit");
    assert_eq!(response["status"], json!("fail"));
    let details = response["checks"][0]["details"].as_array().expect("details");
    assert_eq!(details.len(), 1);
    assert!(details[0].as_str().expect("detail").contains("stale"));
}

#[test]
fn doctor_reports_counters_index_sizes_and_guardrails() {
    let mut engine = fixed_engine();
    seed_healthy(&mut engine);

    let response = engine
        .execute("doctor", &json!({ "profile": "agent-1" }))
        .expect("doctor");
    assert_eq!(response["status"], json!("ok"));
    assert_eq!(response["counters"]["eventCount"], json!(1));
    assert_eq!(response["indexSizes"]["episodes"], json!(1));
    assert_eq!(response["indexSizes"]["rules"], json!(1));
    assert_eq!(response["guardrails"]["maxRecallItems"], json!(20));
    assert_eq!(response["totals"]["storeCount"], json!(1));
    assert_eq!(response["totals"]["eventCount"], json!(1));
    assert_eq!(response["counters"]["mutations"]["ingest"], json!(1));
    assert_eq!(response["counters"]["mutations"]["curate"], json!(1));
}

#[test]
fn doctor_on_an_empty_bucket_is_ok() {
    let mut engine = fixed_engine();
    let response = engine
        .execute("doctor", &json!({ "profile": "nobody" }))
        .expect("doctor");
    assert_eq!(response["status"], json!("ok"));
    assert_eq!(response["counters"]["eventCount"], json!(0));
    assert_eq!(response["totals"]["storeCount"], json!(0));
}
