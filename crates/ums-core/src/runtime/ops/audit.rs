// crates/ums-core/src/runtime/ops/audit.rs
// ============================================================================
// Module: Audit and Doctor Handlers
// Description: Invariant sweeps and engine diagnostics.
// Purpose: Verify bucket invariants and report engine health.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Audit runs invariant sweeps over one bucket: evidence presence and
//! resolution, tombstone visibility, supersede chronology, freshness,
//! identity primaries, and schedule provenance. Doctor reports
//! counters, index sizes, and guardrail configuration, degrading its
//! status when any audit check fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::EpisodeId;
use crate::core::policy::has_policy_exception;
use crate::core::rules::RuleStatus;
use crate::core::time::MILLIS_PER_DAY;
use crate::core::time::Timestamp;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::index::DocKind;
use crate::runtime::index::documents_for_bucket;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::AuditRequest;
use crate::runtime::requests::DoctorRequest;
use crate::runtime::responses::AuditResponse;
use crate::runtime::responses::CheckResult;
use crate::runtime::responses::DoctorResponse;
use crate::runtime::responses::EngineTotals;
use crate::runtime::responses::IndexSizes;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::state::ProfileState;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Check Names
// ============================================================================

/// All audit check names in execution order.
pub(crate) const CHECK_NAMES: [&str; 6] = [
    "evidence_presence",
    "tombstone_visibility",
    "conflict_chronology",
    "freshness",
    "identity_primary",
    "schedule_provenance",
];

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Verifies evidence presence and resolution.
fn check_evidence_presence(bucket: &ProfileState) -> CheckResult {
    let mut details = Vec::new();
    for rule in bucket.rules.values() {
        if rule.evidence_episode_ids.is_empty() && !has_policy_exception(rule.metadata.as_ref()) {
            details.push(format!("rule {} has no evidence", rule.id));
        }
        for pointer in &rule.evidence_episode_ids {
            if !bucket.episodes.contains_key(&EpisodeId::new(pointer.clone())) {
                details.push(format!("rule {} evidence {pointer} does not resolve", rule.id));
            }
        }
    }
    for anti in bucket.anti_patterns.values() {
        if anti.evidence_episode_ids.is_empty() && !has_policy_exception(anti.metadata.as_ref()) {
            details.push(format!("anti-pattern {} has no evidence", anti.id));
        }
    }
    for misconception in bucket.misconceptions.values() {
        if misconception.evidence_episode_ids.is_empty()
            && !has_policy_exception(misconception.metadata.as_ref())
        {
            details.push(format!("misconception {} has no evidence", misconception.id));
        }
    }
    finish("evidence_presence", details)
}

/// Verifies tombstoned rules never surface through the index.
fn check_tombstone_visibility(bucket: &ProfileState) -> CheckResult {
    let mut details = Vec::new();
    let documents = documents_for_bucket(bucket);
    for rule in bucket.rules.values() {
        if rule.status != RuleStatus::Tombstoned {
            continue;
        }
        let visible = documents
            .iter()
            .any(|doc| doc.kind == DocKind::Rule && doc.id == rule.id.as_str());
        if visible {
            details.push(format!("tombstoned rule {} is indexed", rule.id));
        }
    }
    finish("tombstone_visibility", details)
}

/// Verifies supersede chains resolve and stay chronological.
fn check_conflict_chronology(bucket: &ProfileState) -> CheckResult {
    let mut details = Vec::new();
    for rule in bucket.rules.values() {
        if let Some(older) = &rule.supersedes {
            match bucket.rules.get(older) {
                None => details.push(format!("rule {} supersedes missing rule {older}", rule.id)),
                Some(previous) => {
                    if previous.created_at > rule.created_at {
                        details.push(format!(
                            "rule {} supersedes a newer rule {older}",
                            rule.id
                        ));
                    }
                }
            }
        }
        if let Some(newer) = &rule.superseded_by
            && !bucket.rules.contains_key(newer)
        {
            details.push(format!("rule {} superseded by missing rule {newer}", rule.id));
        }
    }
    finish("conflict_chronology", details)
}

/// Flags active rules past the validation horizon.
fn check_freshness(bucket: &ProfileState, freshness_days: i64, now: Timestamp) -> CheckResult {
    let horizon = freshness_days * MILLIS_PER_DAY;
    let mut details = Vec::new();
    for rule in bucket.rules.values() {
        if rule.status != RuleStatus::Active {
            continue;
        }
        let reference = rule.last_validated_at.unwrap_or(rule.created_at);
        if now.unix_millis() - reference.unix_millis() > horizon {
            details.push(format!("rule {} is stale since {}", rule.id, reference.to_rfc3339()));
        }
    }
    finish("freshness", details)
}

/// Verifies each learner profile carries exactly one primary ref.
fn check_identity_primary(bucket: &ProfileState) -> CheckResult {
    let mut details = Vec::new();
    for profile in bucket.learner_profiles.values() {
        let primaries = profile
            .identity_refs
            .iter()
            .filter(|reference| reference.is_primary)
            .count();
        if primaries != 1 {
            details.push(format!(
                "learner profile {} has {primaries} primary refs",
                profile.id
            ));
        }
    }
    finish("identity_primary", details)
}

/// Verifies planning and policy records carry provenance.
fn check_schedule_provenance(bucket: &ProfileState) -> CheckResult {
    let mut details = Vec::new();
    for entry in bucket.review_schedules.values() {
        if entry.source_event_ids.is_empty() && !has_policy_exception(entry.metadata.as_ref()) {
            details.push(format!("review entry {} has no provenance", entry.id));
        }
    }
    for item in bucket.curriculum_items.values() {
        if item.evidence_episode_ids.is_empty() && !has_policy_exception(item.metadata.as_ref()) {
            details.push(format!("curriculum item {} has no evidence", item.id));
        }
    }
    for decision in bucket.policy_decisions.values() {
        if decision.provenance_event_ids.is_empty()
            && !has_policy_exception(decision.metadata.as_ref())
        {
            details.push(format!("policy decision {} has no provenance", decision.id));
        }
    }
    finish("schedule_provenance", details)
}

/// Wraps findings into a check result.
fn finish(name: &str, mut details: Vec<String>) -> CheckResult {
    details.sort();
    CheckResult {
        name: name.to_string(),
        status: if details.is_empty() { "pass" } else { "fail" }.to_string(),
        details,
    }
}

/// Runs the named checks over a bucket (all when `names` is empty).
pub(crate) fn run_checks(
    bucket: &ProfileState,
    names: &[String],
    freshness_days: i64,
    now: Timestamp,
) -> Vec<CheckResult> {
    CHECK_NAMES
        .iter()
        .copied()
        .filter(|name| names.is_empty() || names.iter().any(|wanted| wanted.as_str() == *name))
        .map(|name| match name {
            "evidence_presence" => check_evidence_presence(bucket),
            "tombstone_visibility" => check_tombstone_visibility(bucket),
            "conflict_chronology" => check_conflict_chronology(bucket),
            "freshness" => check_freshness(bucket, freshness_days, now),
            "identity_primary" => check_identity_primary(bucket),
            _ => check_schedule_provenance(bucket),
        })
        .collect()
}

// ============================================================================
// SECTION: Audit Handler
// ============================================================================

/// Handles the `audit` operation. Never writes.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed request.
pub(crate) fn audit(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: AuditRequest = parse(request)?;
    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&scope.store_id, &scope.profile)
        .unwrap_or(&empty);

    let checks = run_checks(bucket, &typed.checks, engine.config.freshness_days, scope.now);
    let status = if checks.iter().all(|check| check.status == "pass") {
        "pass"
    } else {
        "fail"
    };

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = AuditResponse {
        meta: ResponseMeta::new(
            "audit",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        checks,
        status: status.to_string(),
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Doctor Handler
// ============================================================================

/// Handles the `doctor` operation. Never writes.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed request.
pub(crate) fn doctor(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let _typed: DoctorRequest = parse(request)?;
    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&scope.store_id, &scope.profile)
        .unwrap_or(&empty);

    let documents = documents_for_bucket(bucket);
    let index_sizes = IndexSizes {
        episodes: u64::try_from(
            documents.iter().filter(|doc| doc.kind == DocKind::Episode).count(),
        )
        .unwrap_or(u64::MAX),
        rules: u64::try_from(documents.iter().filter(|doc| doc.kind == DocKind::Rule).count())
            .unwrap_or(u64::MAX),
        anti_patterns: u64::try_from(
            documents.iter().filter(|doc| doc.kind == DocKind::AntiPattern).count(),
        )
        .unwrap_or(u64::MAX),
    };

    let checks = run_checks(bucket, &[], engine.config.freshness_days, scope.now);
    let status = if checks.iter().all(|check| check.status == "pass") {
        "ok"
    } else {
        "degraded"
    };

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = DoctorResponse {
        meta: ResponseMeta::new(
            "doctor",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        status: status.to_string(),
        counters: bucket.counters.clone(),
        index_sizes,
        guardrails: engine.config.guardrails.clone(),
        totals: EngineTotals {
            store_count: u64::try_from(engine.state.store_count()).unwrap_or(u64::MAX),
            event_count: engine.state.event_count(),
        },
    };
    to_value(&response)
}
