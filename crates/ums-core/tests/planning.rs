// crates/ums-core/tests/planning.rs
// ============================================================================
// Module: Planning Tests
// Description: Curriculum upserts, review schedules, clock sweep, rebalance.
// ============================================================================
//! ## Overview
//! Validates plan-item invariants (rank, window, evidence), review
//! schedule bounds, the scheduled-to-due clock sweep, and deterministic
//! per-day rebalancing.

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
fn curriculum_items_upsert_and_replay_as_noop() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "items": [{
            "objectiveId": "obj-recursion",
            "recommendationRank": 1,
            "evidenceEventIds": ["ep-plan-1"],
        }],
    });
    let first = engine.execute("curriculum_plan_update", &request).expect("first");
    assert_eq!(first["created"], json!(1));
    let item_id = first["itemIds"][0].as_str().expect("item id");
    assert!(item_id.starts_with("cp_"));

    let second = engine.execute("curriculum_plan_update", &request).expect("second");
    assert_eq!(second["noops"], json!(1));
    assert_eq!(second["action"], json!("noop"));
}

#[test]
fn curriculum_rank_zero_is_rejected() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "curriculum_plan_update",
            &json!({
                "profile": "learner-1",
                "items": [{
                    "objectiveId": "obj-x",
                    "recommendationRank": 0,
                    "evidenceEventIds": ["ep-plan-1"],
                }],
            }),
        )
        .expect_err("rank zero");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn curriculum_window_must_be_ordered() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "curriculum_plan_update",
            &json!({
                "profile": "learner-1",
                "items": [{
                    "objectiveId": "obj-x",
                    "recommendationRank": 1,
                    "evidenceEventIds": ["ep-plan-1"],
                    "window": {
                        "start": "2026-08-10T00:00:00Z",
                        "end": "2026-08-01T00:00:00Z",
                    },
                }],
            }),
        )
        .expect_err("inverted window");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn curriculum_transitions_follow_the_state_machine() {
    let mut engine = fixed_engine();
    let proposed = json!({
        "profile": "learner-1",
        "items": [{
            "objectiveId": "obj-graphs",
            "recommendationRank": 2,
            "evidenceEventIds": ["ep-plan-2"],
            "status": "proposed",
        }],
    });
    engine.execute("curriculum_plan_update", &proposed).expect("proposed");

    let committed = json!({
        "profile": "learner-1",
        "items": [{
            "objectiveId": "obj-graphs",
            "recommendationRank": 2,
            "evidenceEventIds": ["ep-plan-2"],
            "status": "committed",
        }],
    });
    let response = engine.execute("curriculum_plan_update", &committed).expect("committed");
    assert_eq!(response["updated"], json!(1));

    // Committed items cannot regress to proposed.
    let err = engine
        .execute("curriculum_plan_update", &proposed)
        .expect_err("regression");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn review_entries_validate_interval_and_ease() {
    let mut engine = fixed_engine();
    let zero_interval = json!({
        "profile": "learner-1",
        "entries": [{
            "targetId": "rule_0000000000000001",
            "dueAt": "2026-08-02T00:00:00Z",
            "intervalDays": 0,
            "sourceEventIds": ["ep-srs-1"],
        }],
    });
    let err = engine
        .execute("review_schedule_update", &zero_interval)
        .expect_err("interval");
    assert_eq!(err.code(), "VALIDATION_FAILED");

    let bad_ease = json!({
        "profile": "learner-1",
        "entries": [{
            "targetId": "rule_0000000000000001",
            "dueAt": "2026-08-02T00:00:00Z",
            "intervalDays": 3,
            "easeFactor": 5.0,
            "sourceEventIds": ["ep-srs-1"],
        }],
    });
    let err = engine.execute("review_schedule_update", &bad_ease).expect_err("ease");
    assert_eq!(err.code(), "VALIDATION_FAILED");

    let no_provenance = json!({
        "profile": "learner-1",
        "entries": [{
            "targetId": "rule_0000000000000001",
            "dueAt": "2026-08-02T00:00:00Z",
            "intervalDays": 3,
        }],
    });
    let err = engine
        .execute("review_schedule_update", &no_provenance)
        .expect_err("provenance");
    assert_eq!(err.code(), "EVIDENCE_REQUIRED");
}

#[test]
fn clock_sweep_moves_scheduled_entries_due() {
    let mut engine = fixed_engine();
    let request = json!({
        "profile": "learner-1",
        "entries": [
            {
                "targetId": "target-early",
                "dueAt": "2026-08-01T00:00:00Z",
                "intervalDays": 3,
                "sourceEventIds": ["ep-srs-1"],
            },
            {
                "targetId": "target-late",
                "dueAt": "2026-09-01T00:00:00Z",
                "intervalDays": 3,
                "sourceEventIds": ["ep-srs-2"],
            },
        ],
    });
    engine.execute("review_schedule_update", &request).expect("seed");

    let sweep = engine
        .execute(
            "review_schedule_clock",
            &json!({ "profile": "learner-1", "now": "2026-08-15T00:00:00Z" }),
        )
        .expect("sweep");
    assert_eq!(sweep["transitioned"].as_array().map(Vec::len), Some(1));
    assert_eq!(sweep["dueCount"], json!(1));

    // A second sweep at the same instant changes nothing.
    let replay = engine
        .execute(
            "review_schedule_clock",
            &json!({ "profile": "learner-1", "now": "2026-08-15T00:00:00Z" }),
        )
        .expect("replay");
    assert_eq!(replay["transitioned"], json!([]));
    assert_eq!(replay["action"], json!("noop"));
    assert_eq!(replay["dueCount"], json!(1));
}

#[test]
fn rebalance_caps_entries_per_utc_day() {
    let mut engine = fixed_engine();
    let entries: Vec<Value> = (0 .. 6)
        .map(|index| {
            json!({
                "targetId": format!("target-{index}"),
                "dueAt": "2026-08-10T09:00:00Z",
                "intervalDays": 2,
                "sourceEventIds": [format!("ep-srs-{index}")],
            })
        })
        .collect();
    engine
        .execute(
            "review_schedule_update",
            &json!({ "profile": "learner-1", "entries": entries }),
        )
        .expect("seed");

    let response = engine
        .execute(
            "review_set_rebalance",
            &json!({ "profile": "learner-1", "maxDuePerDay": 2 }),
        )
        .expect("rebalance");
    let moved = response["moved"].as_array().expect("moved");
    assert_eq!(moved.len(), 4, "six entries, cap two per day, four move");
    assert_eq!(response["unchanged"], json!(2));
    for entry in moved {
        let to = entry["toDueAt"].as_str().expect("toDueAt");
        assert!(to > "2026-08-10T09:00:00", "moved forward: {to}");
    }

    // Rebalancing again finds a balanced set.
    let replay = engine
        .execute(
            "review_set_rebalance",
            &json!({ "profile": "learner-1", "maxDuePerDay": 2 }),
        )
        .expect("replay");
    assert_eq!(replay["moved"], json!([]));
    assert_eq!(replay["action"], json!("noop"));
}

#[test]
fn rebalance_rejects_zero_cap() {
    let mut engine = fixed_engine();
    let err = engine
        .execute(
            "review_set_rebalance",
            &json!({ "profile": "learner-1", "maxDuePerDay": 0 }),
        )
        .expect_err("zero cap");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}
