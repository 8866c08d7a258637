// crates/ums-core/tests/feedback_outcome.rs
// ============================================================================
// Module: Feedback and Outcome Tests
// Description: Reinforcement math, tombstoning, inversion, outcome mapping.
// ============================================================================
//! ## Overview
//! Validates the reinforcement deltas (+0.08 helpful, -0.18 harmful),
//! tombstoning at <= 0.05, inversion into `Avoid:` anti-patterns,
//! replay-safe signal episodes, and misconception mapping from failed
//! outcomes with harm escalation thresholds.

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

/// Seeds one curated rule and returns its identifier.
fn seed_rule(engine: &mut MemoryEngine, confidence: f64) -> String {
    let ingest = engine
        .execute(
            "ingest",
            &json!({
                "profile": "agent-1",
                "events": [{ "type": "note", "content": "pin dependency versions in ci" }],
            }),
        )
        .expect("ingest");
    let episode_id = ingest["episodeIds"][0].as_str().expect("episode id").to_string();

    let curated = engine
        .execute(
            "curate",
            &json!({
                "profile": "agent-1",
                "candidates": [{
                    "statement": "Pin dependency versions in CI",
                    "confidence": confidence,
                    "evidenceEpisodeIds": [episode_id],
                }],
            }),
        )
        .expect("curate");
    curated["created"][0].as_str().expect("rule id").to_string()
}

#[test]
fn helpful_feedback_raises_confidence_by_eight_points() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);

    let response = engine
        .execute(
            "feedback",
            &json!({ "profile": "agent-1", "ruleId": rule_id, "signal": "helpful" }),
        )
        .expect("feedback");
    assert_eq!(response["previousConfidence"], json!(0.5));
    assert_eq!(response["confidence"], json!(0.58));
    assert_eq!(response["status"], json!("active"));
}

#[test]
fn harmful_feedback_drops_confidence_by_eighteen_points() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);

    let response = engine
        .execute(
            "feedback",
            &json!({ "profile": "agent-1", "ruleId": rule_id, "signal": "harmful" }),
        )
        .expect("feedback");
    assert_eq!(response["confidence"], json!(0.32));
}

#[test]
fn confidence_depletion_tombstones_the_rule() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.2);

    let response = engine
        .execute(
            "feedback",
            &json!({ "profile": "agent-1", "ruleId": rule_id, "signal": "harmful" }),
        )
        .expect("feedback");
    assert_eq!(response["confidence"], json!(0.02));
    assert_eq!(response["status"], json!("tombstoned"));

    // Tombstoned rules leave default recall entirely.
    let recall = engine
        .execute("context", &json!({ "profile": "agent-1", "query": "" }))
        .expect("context");
    assert_eq!(recall["topRules"], json!([]));
    let doctor = engine
        .execute("doctor", &json!({ "profile": "agent-1" }))
        .expect("doctor");
    assert_eq!(doctor["indexSizes"]["rules"], json!(0));
}

#[test]
fn replayed_feedback_signal_is_a_noop() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);
    let request = json!({ "profile": "agent-1", "ruleId": rule_id, "signal": "helpful" });

    let first = engine.execute("feedback", &request).expect("first");
    assert_eq!(first["confidence"], json!(0.58));

    let second = engine.execute("feedback", &request).expect("second");
    assert_eq!(second["action"], json!("noop"));
    assert_eq!(second["confidence"], json!(0.58), "no double reinforcement");
}

#[test]
fn invert_produces_avoid_anti_pattern() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);

    let response = engine
        .execute(
            "feedback",
            &json!({
                "profile": "agent-1",
                "ruleId": rule_id,
                "signal": "harmful",
                "invert": true,
                "reason": "caused an incident",
            }),
        )
        .expect("feedback");
    let anti_id = response["antiPatternId"].as_str().expect("anti id");
    assert!(anti_id.starts_with("anti_"));

    let recall = engine
        .execute("context", &json!({ "profile": "agent-1", "query": "" }))
        .expect("context");
    let antis = recall["antiPatterns"].as_array().expect("antiPatterns");
    assert_eq!(antis.len(), 1);
    assert_eq!(
        antis[0]["statement"],
        json!("Avoid: Pin dependency versions in CI")
    );
}

#[test]
fn feedback_for_unknown_rule_is_not_found() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "feedback",
            &json!({ "profile": "agent-1", "ruleId": "rule_ffffffffffffffff", "signal": "helpful" }),
        )
        .expect_err("unknown rule");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn successful_outcome_reinforces_used_rules() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);

    let response = engine
        .execute(
            "outcome",
            &json!({
                "profile": "agent-1",
                "taskId": "task-1",
                "status": "success",
                "usedRuleIds": [rule_id],
            }),
        )
        .expect("outcome");
    assert_eq!(response["reinforcedRuleIds"], json!([rule_id]));
    assert!(response["episodeId"].as_str().expect("episode").starts_with("ep_"));
}

#[test]
fn failed_outcome_emits_misconception_signal() {
    let mut engine = fixed_engine();
    let rule_id = seed_rule(&mut engine, 0.5);

    let response = engine
        .execute(
            "outcome",
            &json!({
                "profile": "agent-1",
                "taskId": "task-2",
                "status": "failure",
                "usedRuleIds": [rule_id],
                "misconceptionKey": "premature-upgrade",
                "severity": 0.5,
            }),
        )
        .expect("outcome");
    let misconception_id = response["misconceptionId"].as_str().expect("mis id");
    assert!(misconception_id.starts_with("mis_"));
}

#[test]
fn repeated_harm_crosses_escalation_thresholds() {
    let mut engine = fixed_engine();
    let mut escalations = Vec::new();
    for signal in 0 .. 5 {
        let response = engine
            .execute(
                "misconception_update",
                &json!({
                    "profile": "learner-1",
                    "misconceptionKey": "shared-mutable-state",
                    "signal": "harmful",
                    "statement": "sharing mutable state across workers",
                    "evidenceEventIds": [format!("ep-harm-{signal}")],
                    "sourceSignalIds": [format!("sig-{signal}")],
                }),
            )
            .expect("signal");
        for id in response["escalatedAntiPatternIds"].as_array().expect("escalations") {
            escalations.push(id.as_str().expect("id").to_string());
        }
    }
    // Thresholds 2, 3, and 5 each fire exactly once.
    assert_eq!(escalations.len(), 3);
    let unique: std::collections::BTreeSet<&String> = escalations.iter().collect();
    assert_eq!(unique.len(), 3);

    let recall = engine
        .execute("context", &json!({ "profile": "learner-1", "query": "" }))
        .expect("context");
    let antis = recall["antiPatterns"].as_array().expect("antis");
    assert_eq!(antis.len(), 3);
    assert!(
        antis
            .iter()
            .all(|anti| anti["statement"]
                .as_str()
                .expect("statement")
                .starts_with("Avoid: ")),
        "escalation artifacts must carry the Avoid prefix"
    );
}

#[test]
fn harm_decay_respects_confidence_floor() {
    let mut engine = fixed_engine();
    let mut last_confidence = 1.0_f64;
    for signal in 0 .. 8 {
        let response = engine
            .execute(
                "misconception_update",
                &json!({
                    "profile": "learner-1",
                    "misconceptionKey": "floor-check",
                    "signal": "harmful",
                    "severity": 1.0,
                    "evidenceEventIds": [format!("ep-harm-{signal}")],
                    "sourceSignalIds": [format!("sig-{signal}")],
                }),
            )
            .expect("signal");
        last_confidence = response["confidence"].as_f64().expect("confidence");
    }
    assert!(last_confidence >= 0.05, "confidence floor violated: {last_confidence}");
}
