// crates/ums-core/src/runtime/ops/policy.rs
// ============================================================================
// Module: Policy Handlers
// Description: Policy decision upserts, recall authorization, degraded mode.
// Purpose: Govern recall and tutoring through provenance-backed decisions.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Policy decisions key on `(storeId, profileId, policyKey)` and only
//! escalate (`allow < review < deny`). Recall authorization evaluates
//! the stored decisions for a key; tutor degradation derives from
//! misconception harm; the audit export bundles decisions with the
//! invariant check list under the recall byte budget.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::hashing::canonical_byte_len;
use crate::core::policy::PolicyDecision;
use crate::core::policy::PolicyOutcome;
use crate::core::signals::MisconceptionStatus;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::guardrails::estimated_tokens;
use crate::runtime::ops::audit::run_checks;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::ExportRequest;
use crate::runtime::requests::PolicyDecisionUpdateRequest;
use crate::runtime::requests::RecallAuthorizationRequest;
use crate::runtime::requests::TutorDegradedRequest;
use crate::runtime::responses::CheckResult;
use crate::runtime::responses::PolicyAuditExportResponse;
use crate::runtime::responses::PolicyDecisionUpdateResponse;
use crate::runtime::responses::PolicyDecisionView;
use crate::runtime::responses::RecallAuthorizationResponse;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::responses::TutorDegradedResponse;
use crate::runtime::state::ProfileState;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default policy key evaluated by `recall_authorization`.
const RECALL_POLICY_KEY: &str = "recall";
/// Policy key recorded by `tutor_degraded`.
const TUTOR_POLICY_KEY: &str = "tutor_degraded";
/// Harmful-signal count at which tutoring degrades.
const TUTOR_HARM_THRESHOLD: u64 = 3;

// ============================================================================
// SECTION: Decision Upsert Handler
// ============================================================================

/// Handles the `policy_decision_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a `deny` without reason
/// codes and [`EngineError::EvidenceRequired`] for missing provenance.
pub(crate) fn policy_decision_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: PolicyDecisionUpdateRequest = parse(request)?;
    let profile_id = typed
        .profile_id
        .clone()
        .unwrap_or_else(|| scope.profile.as_str().to_string());

    let mut bucket = engine.stage_bucket(scope);
    let mut incoming = PolicyDecision::build(
        &scope.store_id,
        profile_id,
        typed.policy_key.clone(),
        typed.outcome,
        &typed.reason_codes,
        &typed.provenance_event_ids,
        typed.evaluated_at,
        typed.metadata.clone(),
        scope.now,
    )?;
    if typed.evaluated_at.is_none()
        && let Some(existing) = bucket.policy_decisions.get(&incoming.id)
    {
        // Without an explicit evaluation time, replays keep the stored
        // one so identical requests stay noops.
        incoming.evaluated_at = existing.evaluated_at;
    }
    let decision_key = incoming.id.clone();
    let action = bucket.upsert_policy_decision(incoming, scope.now)?;
    let stored = bucket
        .policy_decisions
        .get(&decision_key)
        .cloned()
        .ok_or_else(|| EngineError::contract("policy decision vanished during upsert"))?;

    if action.is_mutation() {
        bucket.counters.record_mutation("policy_decision_update");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = PolicyDecisionUpdateResponse {
        meta: ResponseMeta::new(
            "policy_decision_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        decision_id: stored.id.as_str().to_string(),
        audit_id: stored.audit_id.as_str().to_string(),
        outcome: stored.outcome.as_str().to_string(),
        reason_codes: stored.reason_codes,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Recall Authorization Handler
// ============================================================================

/// Evaluates stored decisions for one policy key.
fn evaluate_policy(
    bucket: &ProfileState,
    policy_key: &str,
) -> (PolicyOutcome, Vec<String>, Vec<String>) {
    let mut outcome = PolicyOutcome::Allow;
    let mut reason_codes = Vec::new();
    let mut considered = Vec::new();
    for decision in bucket.policy_decisions.values() {
        if decision.policy_key != policy_key {
            continue;
        }
        considered.push(decision.id.as_str().to_string());
        outcome = outcome.escalate(decision.outcome);
        if decision.outcome != PolicyOutcome::Allow {
            reason_codes.extend(decision.reason_codes.iter().cloned());
        }
    }
    reason_codes.sort();
    reason_codes.dedup();
    considered.sort();
    (outcome, reason_codes, considered)
}

/// Handles the `recall_authorization` operation.
///
/// The evaluation itself is a read; a decision is recorded only when
/// the caller supplies provenance for it.
///
/// # Errors
///
/// Returns [`EngineError`] when recording the evaluation fails.
pub(crate) fn recall_authorization(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: RecallAuthorizationRequest = parse(request)?;
    let policy_key = typed
        .policy_key
        .clone()
        .unwrap_or_else(|| RECALL_POLICY_KEY.to_string());

    let mut bucket = engine.stage_bucket(scope);
    let (outcome, mut reason_codes, considered) = evaluate_policy(&bucket, &policy_key);
    if let Some(requester) = &typed.requester_id {
        reason_codes.push(format!("requester:{requester}"));
        reason_codes.sort();
        reason_codes.dedup();
    }

    let mut action = UpsertAction::Noop;
    let mut recorded_decision_id = None;
    if !typed.provenance_event_ids.is_empty() {
        let mut incoming = PolicyDecision::build(
            &scope.store_id,
            scope.profile.as_str(),
            policy_key.clone(),
            outcome,
            &reason_codes,
            &typed.provenance_event_ids,
            None,
            None,
            scope.now,
        )?;
        if let Some(existing) = bucket.policy_decisions.get(&incoming.id) {
            incoming.evaluated_at = existing.evaluated_at;
        }
        let decision_key = incoming.id.clone();
        action = bucket.upsert_policy_decision(incoming, scope.now)?;
        recorded_decision_id = Some(decision_key.as_str().to_string());
    }

    if action.is_mutation() {
        bucket.counters.record_mutation("recall_authorization");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = RecallAuthorizationResponse {
        meta: ResponseMeta::new(
            "recall_authorization",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        policy_key,
        outcome: outcome.as_str().to_string(),
        reason_codes,
        considered_decision_ids: considered,
        recorded_decision_id,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Tutor Degraded Handler
// ============================================================================

/// Handles the `tutor_degraded` operation.
///
/// Tutoring degrades when any active misconception reached the harm
/// threshold or the caller supplies an explicit reason. Degradation is
/// recorded as a `review` decision when provenance permits.
///
/// # Errors
///
/// Returns [`EngineError`] when recording the decision fails.
pub(crate) fn tutor_degraded(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: TutorDegradedRequest = parse(request)?;

    let mut bucket = engine.stage_bucket(scope);
    let mut excluded: Vec<String> = bucket
        .misconceptions
        .values()
        .filter(|m| {
            m.status == MisconceptionStatus::Active
                && m.harmful_signal_count >= TUTOR_HARM_THRESHOLD
        })
        .map(|m| m.misconception_key.clone())
        .collect();
    excluded.sort();
    excluded.dedup();

    let mut reason_codes = Vec::new();
    if !excluded.is_empty() {
        reason_codes.push("harm_threshold".to_string());
    }
    if typed.reason.is_some() {
        reason_codes.push("explicit_reason".to_string());
    }
    let degraded = !reason_codes.is_empty();

    let mut action = UpsertAction::Noop;
    let mut decision_id = None;
    if !typed.provenance_event_ids.is_empty() {
        let outcome = if degraded {
            PolicyOutcome::Review
        } else {
            PolicyOutcome::Allow
        };
        let mut incoming = PolicyDecision::build(
            &scope.store_id,
            scope.profile.as_str(),
            TUTOR_POLICY_KEY,
            outcome,
            &reason_codes,
            &typed.provenance_event_ids,
            None,
            None,
            scope.now,
        )?;
        if let Some(existing) = bucket.policy_decisions.get(&incoming.id) {
            incoming.evaluated_at = existing.evaluated_at;
        }
        let decision_key = incoming.id.clone();
        action = bucket.upsert_policy_decision(incoming, scope.now)?;
        decision_id = Some(decision_key.as_str().to_string());
    }

    if action.is_mutation() {
        bucket.counters.record_mutation("tutor_degraded");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = TutorDegradedResponse {
        meta: ResponseMeta::new(
            "tutor_degraded",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        degraded,
        excluded_misconception_keys: excluded,
        decision_id,
        reason_codes,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Policy Audit Export Handler
// ============================================================================

/// Bounded export document measured against the byte budget.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyAuditBundle {
    /// Bounded policy decisions.
    decisions: Vec<PolicyDecisionView>,
    /// Audit check results.
    checks: Vec<CheckResult>,
}

/// Handles the `policy_audit_export` operation. Never writes.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when even an empty export
/// exceeds the budget.
pub(crate) fn policy_audit_export(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ExportRequest = parse(request)?;
    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&scope.store_id, &scope.profile)
        .unwrap_or(&empty);

    let max_items = typed.max_items.unwrap_or(engine.config.guardrails.max_recall_items);
    let token_budget = typed
        .token_budget
        .unwrap_or(engine.config.guardrails.default_token_budget);
    let max_bytes = token_budget * 4;

    let decisions: Vec<PolicyDecisionView> = bucket
        .list_policy_decisions(Some(max_items))
        .into_iter()
        .map(|decision| PolicyDecisionView {
            id: decision.id.as_str().to_string(),
            policy_key: decision.policy_key.clone(),
            outcome: decision.outcome.as_str().to_string(),
            reason_codes: decision.reason_codes.clone(),
            evaluated_at: decision.evaluated_at,
        })
        .collect();
    let checks = run_checks(bucket, &[], engine.config.freshness_days, scope.now);

    let mut bundle = PolicyAuditBundle {
        decisions,
        checks,
    };
    let mut truncated = false;
    let actual = loop {
        let actual = canonical_byte_len(&bundle)?;
        if actual <= max_bytes {
            break actual;
        }
        truncated = true;
        if bundle.decisions.pop().is_some() {
            continue;
        }
        if bundle.checks.pop().is_some() {
            continue;
        }
        return Err(EngineError::payload_limit(format!(
            "policy audit export cannot fit byte budget: {actual} > {max_bytes}"
        )));
    };

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = PolicyAuditExportResponse {
        meta: ResponseMeta::new(
            "policy_audit_export",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        decisions: bundle.decisions,
        checks: bundle.checks,
        truncated,
        estimated_tokens: estimated_tokens(actual),
    };
    to_value(&response)
}
