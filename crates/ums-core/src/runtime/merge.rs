// crates/ums-core/src/runtime/merge.rs
// ============================================================================
// Module: UMS Merge Rules
// Description: Per-entity deterministic merge functions for repository upserts.
// Purpose: Make every upsert commutative within the allowed field space.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Merges follow fixed per-field rules: set-valued fields union and sort,
//! counters take the max, `createdAt` takes the min, mutation timestamps
//! take the max, and metadata conflicts resolve in favor of the record
//! with the later `updatedAt` (ties broken by canonical-JSON lex order of
//! the whole record). Scalar lifecycle fields take the incoming write;
//! handlers construct incoming records from existing-plus-request, so a
//! merge whose result equals the existing record byte-for-byte is a
//! replay-safe noop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::canonical_json_string;
use crate::core::learner::IdentityEdge;
use crate::core::learner::IdentityRef;
use crate::core::learner::LearnerProfile;
use crate::core::planning::CurriculumPlanItem;
use crate::core::planning::ReviewScheduleEntry;
use crate::core::policy::PolicyDecision;
use crate::core::rules::AntiPattern;
use crate::core::rules::ProceduralRule;
use crate::core::rules::RuleStatus;
use crate::core::signals::Misconception;
use crate::core::text::union_sorted;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Comparison Helpers
// ============================================================================

/// Reports whether two values share one canonical JSON form.
///
/// # Errors
///
/// Returns [`EngineError`] when either value cannot be canonicalized.
pub fn canonical_eq<T: Serialize>(left: &T, right: &T) -> Result<bool, EngineError> {
    Ok(canonical_json_bytes(left)? == canonical_json_bytes(right)?)
}

/// Decides whether the incoming record is preferred for scalar fields:
/// later `updatedAt` wins, ties broken by canonical-JSON lex order.
fn prefer_incoming<T: Serialize>(
    existing: &T,
    existing_updated: Timestamp,
    incoming: &T,
    incoming_updated: Timestamp,
) -> bool {
    if incoming_updated != existing_updated {
        return incoming_updated > existing_updated;
    }
    let existing_canon = canonical_json_string(existing).unwrap_or_default();
    let incoming_canon = canonical_json_string(incoming).unwrap_or_default();
    incoming_canon < existing_canon
}

/// Merges optional metadata objects: keys union, conflicts resolved in
/// favor of the preferred record.
fn merge_metadata(
    existing: Option<&Value>,
    incoming: Option<&Value>,
    incoming_preferred: bool,
) -> Option<Value> {
    match (existing, incoming) {
        (None, None) => None,
        (Some(value), None) | (None, Some(value)) => Some(value.clone()),
        (Some(existing), Some(incoming)) => {
            let ordered = if incoming_preferred {
                (existing.as_object(), incoming.as_object())
            } else {
                (incoming.as_object(), existing.as_object())
            };
            let (Some(base), Some(overlay)) = ordered else {
                // Non-object metadata cannot merge by key; the preferred
                // record replaces the other wholesale.
                return if incoming_preferred {
                    Some(incoming.clone())
                } else {
                    Some(existing.clone())
                };
            };
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Some(Value::Object(merged))
        }
    }
}

/// Takes the chronologically earlier timestamp.
const fn min_time(left: Timestamp, right: Timestamp) -> Timestamp {
    if right.unix_millis() < left.unix_millis() {
        right
    } else {
        left
    }
}

/// Takes the chronologically later timestamp.
const fn max_time(left: Timestamp, right: Timestamp) -> Timestamp {
    if right.unix_millis() > left.unix_millis() {
        right
    } else {
        left
    }
}

/// Takes the later of two optional timestamps.
fn max_opt_time(left: Option<Timestamp>, right: Option<Timestamp>) -> Option<Timestamp> {
    match (left, right) {
        (None, None) => None,
        (Some(value), None) | (None, Some(value)) => Some(value),
        (Some(left), Some(right)) => Some(max_time(left, right)),
    }
}

// ============================================================================
// SECTION: Rule Merges
// ============================================================================

/// Merges a procedural rule. Tombstoned status is sticky.
#[must_use]
pub fn merge_rule(existing: &ProceduralRule, incoming: &ProceduralRule) -> ProceduralRule {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    let status = if existing.status == RuleStatus::Tombstoned
        || incoming.status == RuleStatus::Tombstoned
    {
        RuleStatus::Tombstoned
    } else {
        RuleStatus::Active
    };
    ProceduralRule {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        statement: existing.statement.clone(),
        confidence: existing.confidence.max(incoming.confidence),
        evidence_episode_ids: union_sorted(
            &existing.evidence_episode_ids,
            &incoming.evidence_episode_ids,
        ),
        status,
        helpful_count: existing.helpful_count.max(incoming.helpful_count),
        harmful_count: existing.harmful_count.max(incoming.harmful_count),
        created_at: min_time(existing.created_at, incoming.created_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        last_validated_at: max_opt_time(existing.last_validated_at, incoming.last_validated_at),
        supersedes: incoming.supersedes.clone().or_else(|| existing.supersedes.clone()),
        superseded_by: incoming
            .superseded_by
            .clone()
            .or_else(|| existing.superseded_by.clone()),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

/// Merges an anti-pattern.
#[must_use]
pub fn merge_anti_pattern(existing: &AntiPattern, incoming: &AntiPattern) -> AntiPattern {
    let incoming_preferred =
        prefer_incoming(existing, existing.created_at, incoming, incoming.created_at);
    AntiPattern {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        statement: existing.statement.clone(),
        confidence: existing.confidence.max(incoming.confidence),
        evidence_episode_ids: union_sorted(
            &existing.evidence_episode_ids,
            &incoming.evidence_episode_ids,
        ),
        source_rule_id: incoming
            .source_rule_id
            .clone()
            .or_else(|| existing.source_rule_id.clone()),
        source_misconception_id: incoming
            .source_misconception_id
            .clone()
            .or_else(|| existing.source_misconception_id.clone()),
        escalation_threshold: incoming.escalation_threshold.or(existing.escalation_threshold),
        created_at: min_time(existing.created_at, incoming.created_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

// ============================================================================
// SECTION: Identity Merges
// ============================================================================

/// Merges identity refs: the preferred record keeps its primary flag,
/// the other record contributes missing refs as secondaries.
fn merge_identity_refs(preferred: &[IdentityRef], other: &[IdentityRef]) -> Vec<IdentityRef> {
    let mut merged: Vec<IdentityRef> = preferred.to_vec();
    for candidate in other {
        let present = merged
            .iter()
            .any(|r| r.namespace == candidate.namespace && r.value == candidate.value);
        if !present {
            merged.push(IdentityRef {
                namespace: candidate.namespace.clone(),
                value: candidate.value.clone(),
                is_primary: false,
            });
        }
    }
    merged.sort();
    merged
}

/// Merges a learner profile. Version is monotone; scalar fields take
/// the incoming write (handlers carry existing values forward when the
/// request omits them).
#[must_use]
pub fn merge_learner_profile(
    existing: &LearnerProfile,
    incoming: &LearnerProfile,
) -> LearnerProfile {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    LearnerProfile {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        learner_id: existing.learner_id.clone(),
        identity_refs: merge_identity_refs(&incoming.identity_refs, &existing.identity_refs),
        goals: union_sorted(&existing.goals, &incoming.goals),
        interest_tags: union_sorted(&existing.interest_tags, &incoming.interest_tags),
        status: incoming.status,
        version: existing.version.max(incoming.version),
        profile_confidence: incoming.profile_confidence,
        evidence_event_ids: union_sorted(
            &existing.evidence_event_ids,
            &incoming.evidence_event_ids,
        ),
        created_at: min_time(existing.created_at, incoming.created_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

/// Merges an identity edge.
#[must_use]
pub fn merge_identity_edge(existing: &IdentityEdge, incoming: &IdentityEdge) -> IdentityEdge {
    IdentityEdge {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        profile_id: existing.profile_id.clone(),
        relation: existing.relation,
        from_ref: existing.from_ref.clone(),
        to_ref: existing.to_ref.clone(),
        evidence_episode_ids: union_sorted(
            &existing.evidence_episode_ids,
            &incoming.evidence_episode_ids,
        ),
        confidence: existing.confidence.max(incoming.confidence),
        created_at: min_time(existing.created_at, incoming.created_at),
    }
}

// ============================================================================
// SECTION: Signal Merges
// ============================================================================

/// Merges a misconception. Signal counts are monotone non-decreasing;
/// status and confidence take the incoming write, which the signal
/// handler derives from the existing record.
#[must_use]
pub fn merge_misconception(existing: &Misconception, incoming: &Misconception) -> Misconception {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    Misconception {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        profile_id: existing.profile_id.clone(),
        misconception_key: existing.misconception_key.clone(),
        status: incoming.status,
        confidence: incoming.confidence,
        harmful_signal_count: existing
            .harmful_signal_count
            .max(incoming.harmful_signal_count),
        correction_signal_count: existing
            .correction_signal_count
            .max(incoming.correction_signal_count),
        evidence_episode_ids: union_sorted(
            &existing.evidence_episode_ids,
            &incoming.evidence_episode_ids,
        ),
        source_signal_ids: union_sorted(&existing.source_signal_ids, &incoming.source_signal_ids),
        created_at: min_time(existing.created_at, incoming.created_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        last_signal_at: max_time(existing.last_signal_at, incoming.last_signal_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

// ============================================================================
// SECTION: Planning Merges
// ============================================================================

/// Merges a curriculum plan item. Scalar fields take the incoming
/// write; handlers carry existing values forward when the request
/// omits them.
#[must_use]
pub fn merge_curriculum_item(
    existing: &CurriculumPlanItem,
    incoming: &CurriculumPlanItem,
) -> CurriculumPlanItem {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    CurriculumPlanItem {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        profile_id: existing.profile_id.clone(),
        objective_id: existing.objective_id.clone(),
        recommendation_rank: incoming.recommendation_rank,
        evidence_episode_ids: union_sorted(
            &existing.evidence_episode_ids,
            &incoming.evidence_episode_ids,
        ),
        status: incoming.status,
        due_at: incoming.due_at.or(existing.due_at),
        window: incoming.window.or(existing.window),
        created_at: min_time(existing.created_at, incoming.created_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

/// Merges a review schedule entry. Scalar fields take the incoming
/// write; handlers carry existing values forward when the request
/// omits them.
#[must_use]
pub fn merge_review_entry(
    existing: &ReviewScheduleEntry,
    incoming: &ReviewScheduleEntry,
) -> ReviewScheduleEntry {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    ReviewScheduleEntry {
        id: existing.id.clone(),
        store_id: existing.store_id.clone(),
        profile_id: existing.profile_id.clone(),
        target_id: existing.target_id.clone(),
        status: incoming.status,
        due_at: incoming.due_at,
        interval_days: incoming.interval_days,
        ease_factor: incoming.ease_factor,
        source_event_ids: union_sorted(&existing.source_event_ids, &incoming.source_event_ids),
        created_at: min_time(existing.created_at, incoming.created_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}

// ============================================================================
// SECTION: Policy Merges
// ============================================================================

/// Merges a policy decision. Outcomes only escalate.
#[must_use]
pub fn merge_policy_decision(
    existing: &PolicyDecision,
    incoming: &PolicyDecision,
) -> PolicyDecision {
    let incoming_preferred =
        prefer_incoming(existing, existing.updated_at, incoming, incoming.updated_at);
    PolicyDecision {
        id: existing.id.clone(),
        audit_id: existing.audit_id.clone(),
        store_id: existing.store_id.clone(),
        profile_id: existing.profile_id.clone(),
        policy_key: existing.policy_key.clone(),
        outcome: existing.outcome.escalate(incoming.outcome),
        reason_codes: union_sorted(&existing.reason_codes, &incoming.reason_codes),
        provenance_event_ids: union_sorted(
            &existing.provenance_event_ids,
            &incoming.provenance_event_ids,
        ),
        created_at: min_time(existing.created_at, incoming.created_at),
        evaluated_at: max_time(existing.evaluated_at, incoming.evaluated_at),
        updated_at: max_time(existing.updated_at, incoming.updated_at),
        metadata: merge_metadata(
            existing.metadata.as_ref(),
            incoming.metadata.as_ref(),
            incoming_preferred,
        ),
    }
}
