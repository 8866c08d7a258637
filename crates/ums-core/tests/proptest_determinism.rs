// crates/ums-core/tests/proptest_determinism.rs
// ============================================================================
// Module: Determinism Property Tests
// Description: Property-based checks for IDs, bounds, and replay.
// ============================================================================
//! ## Overview
//! Property tests for the determinism invariants: identifier stability
//! across list-attribute orderings, recall pack bounds for arbitrary
//! budgets, replay idempotence, and escalation commutativity.

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

use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;
use ums_core::EngineConfig;
use ums_core::FixedClock;
use ums_core::HashAlgorithm;
use ums_core::MemoryEngine;
use ums_core::NullMetricsSink;
use ums_core::Timestamp;
use ums_core::core::hashing::hash_canonical_json;
use ums_core::core::policy::PolicyOutcome;

fn fixed_engine() -> MemoryEngine {
    MemoryEngine::with_services(
        EngineConfig::default(),
        Arc::new(FixedClock::new(Timestamp::from_unix_millis(1_750_000_000_000))),
        Arc::new(NullMetricsSink),
    )
}

/// Short lowercase identifier-ish strings.
fn token() -> impl Strategy<Value = String> {
    "[a-z]{2,8}"
}

proptest! {
    #[test]
    fn profile_id_is_invariant_under_goal_order(
        mut goals in proptest::collection::vec(token(), 1..6),
    ) {
        let mut engine = fixed_engine();
        let forward = json!({
            "profile": "learner-p",
            "learnerId": "learner-prop",
            "identityRefs": [
                { "namespace": "email", "value": "prop@example.com", "isPrimary": true },
            ],
            "goals": goals,
        });
        let first = engine.execute("learner_profile_update", &forward).expect("first");

        goals.reverse();
        let reversed = json!({
            "profile": "learner-p",
            "learnerId": "learner-prop",
            "identityRefs": [
                { "namespace": "email", "value": "prop@example.com", "isPrimary": true },
            ],
            "goals": goals,
        });
        let second = engine.execute("learner_profile_update", &reversed).expect("second");

        prop_assert_eq!(&first["profileId"], &second["profileId"]);
        prop_assert_eq!(&second["action"], &json!("noop"));
    }

    #[test]
    fn recall_packs_respect_arbitrary_budgets(
        contents in proptest::collection::vec(token(), 1..30),
        max_items in 0_usize..10,
        token_budget in 60_usize..400,
    ) {
        let mut engine = fixed_engine();
        let events: Vec<Value> = contents
            .iter()
            .enumerate()
            .map(|(index, word)| {
                json!({ "type": "note", "content": format!("{word} entry {index}") })
            })
            .collect();
        engine
            .execute("ingest", &json!({ "profile": "agent-p", "events": events }))
            .expect("ingest");

        let response = engine
            .execute(
                "context",
                &json!({
                    "profile": "agent-p",
                    "query": "",
                    "maxItems": max_items,
                    "tokenBudget": token_budget,
                }),
            )
            .expect("context");
        let items = response["items"].as_array().expect("items");
        prop_assert!(items.len() <= max_items);
        let estimated = response["estimatedTokens"].as_u64().expect("tokens");
        prop_assert!(estimated <= u64::try_from(token_budget).unwrap_or(u64::MAX));
    }

    #[test]
    fn replaying_an_ingest_stream_is_idempotent(
        contents in proptest::collection::vec(token(), 1..20),
    ) {
        let mut engine = fixed_engine();
        let events: Vec<Value> = contents
            .iter()
            .enumerate()
            .map(|(index, word)| {
                json!({ "type": "note", "content": format!("{word} occurrence {index}") })
            })
            .collect();
        let request = json!({ "profile": "agent-p", "events": events });

        engine.execute("ingest", &request).expect("first");
        let before = engine.snapshot_export().expect("before");
        engine.execute("ingest", &request).expect("second");
        let after = engine.snapshot_export().expect("after");

        let before_hash =
            hash_canonical_json(HashAlgorithm::Sha256, &before).expect("before hash");
        let after_hash = hash_canonical_json(HashAlgorithm::Sha256, &after).expect("after hash");
        prop_assert_eq!(before_hash.value, after_hash.value);
    }

    #[test]
    fn two_engines_agree_on_any_ingest_stream(
        contents in proptest::collection::vec(token(), 1..20),
    ) {
        let events: Vec<Value> = contents
            .iter()
            .enumerate()
            .map(|(index, word)| {
                json!({ "type": "note", "content": format!("{word} occurrence {index}") })
            })
            .collect();
        let request = json!({ "profile": "agent-p", "events": events });

        let mut left = fixed_engine();
        let mut right = fixed_engine();
        left.execute("ingest", &request).expect("left");
        right.execute("ingest", &request).expect("right");

        let left_hash = hash_canonical_json(
            HashAlgorithm::Sha256,
            &left.snapshot_export().expect("left export"),
        )
        .expect("left hash");
        let right_hash = hash_canonical_json(
            HashAlgorithm::Sha256,
            &right.snapshot_export().expect("right export"),
        )
        .expect("right hash");
        prop_assert_eq!(left_hash.value, right_hash.value);
    }

    #[test]
    fn policy_escalation_is_commutative(
        left_rank in 0_u8..3,
        right_rank in 0_u8..3,
    ) {
        let outcomes = [PolicyOutcome::Allow, PolicyOutcome::Review, PolicyOutcome::Deny];
        let left = outcomes[usize::from(left_rank)];
        let right = outcomes[usize::from(right_rank)];
        prop_assert_eq!(left.escalate(right), right.escalate(left));
    }
}
