// crates/ums-core/src/runtime/ops/learner.rs
// ============================================================================
// Module: Learner Identity Handlers
// Description: Learner profile upserts and identity graph updates.
// Purpose: Maintain identity anchors and their evidence-backed relations.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Profile upserts key on `(storeId, learnerId)`, so resubmitting the
//! same profile with list attributes in any order is a noop with an
//! identical identifier. Edge upserts key on the full relation tuple;
//! `misconception_of` and `evidence_of` edges must carry evidence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::learner::IdentityEdge;
use crate::core::learner::LearnerProfile;
use crate::core::learner::LearnerStatus;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::IdentityGraphUpdateRequest;
use crate::runtime::requests::LearnerProfileUpdateRequest;
use crate::runtime::responses::IdentityGraphUpdateResponse;
use crate::runtime::responses::LearnerProfileUpdateResponse;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default confidence for a first-seen learner profile.
const DEFAULT_PROFILE_CONFIDENCE: f64 = 0.5;
/// Default confidence for identity edges.
const DEFAULT_EDGE_CONFIDENCE: f64 = 0.7;

// ============================================================================
// SECTION: Learner Profile Handler
// ============================================================================

/// Handles the `learner_profile_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::IdentityInvariant`] when identity refs are
/// missing or primaries are not unique.
pub(crate) fn learner_profile_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: LearnerProfileUpdateRequest = parse(request)?;

    let mut incoming = LearnerProfile::build(
        &scope.store_id,
        typed.learner_id.clone(),
        &typed.identity_refs,
        &typed.goals,
        &typed.interest_tags,
        typed.status.unwrap_or(LearnerStatus::Active),
        typed.version.unwrap_or(0),
        typed.profile_confidence.unwrap_or(DEFAULT_PROFILE_CONFIDENCE),
        &typed.evidence_event_ids,
        typed.metadata.clone(),
        scope.now,
    )?;

    let mut bucket = engine.stage_bucket(scope);
    if let Some(existing) = bucket.learner_profiles.get(&incoming.id) {
        // Omitted fields keep the profile's current state.
        if typed.status.is_none() {
            incoming.status = existing.status;
        }
        if typed.profile_confidence.is_none() {
            incoming.profile_confidence = existing.profile_confidence;
        }
    }
    let profile_key = incoming.id.clone();
    let action = bucket.upsert_learner_profile(incoming, scope.now)?;
    let stored = bucket
        .learner_profiles
        .get(&profile_key)
        .cloned()
        .ok_or_else(|| EngineError::contract("learner profile vanished during upsert"))?;

    if action.is_mutation() {
        bucket.counters.record_mutation("learner_profile_update");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = LearnerProfileUpdateResponse {
        meta: ResponseMeta::new(
            "learner_profile_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        profile_id: stored.id.as_str().to_string(),
        learner_id: stored.learner_id,
        version: stored.version,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Identity Graph Handler
// ============================================================================

/// Handles the `identity_graph_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::IdentityInvariant`] for degenerate edges and
/// [`EngineError::EvidenceRequired`] for evidence-bearing relations
/// without pointers.
pub(crate) fn identity_graph_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: IdentityGraphUpdateRequest = parse(request)?;
    let profile_id = typed
        .profile_id
        .clone()
        .unwrap_or_else(|| scope.profile.as_str().to_string());
    if typed.edges.is_empty() {
        return Err(EngineError::validation("edges must not be empty"));
    }

    let mut bucket = engine.stage_bucket(scope);
    let mut edge_ids = Vec::with_capacity(typed.edges.len());
    let mut created = 0_u64;
    let mut updated = 0_u64;
    let mut noops = 0_u64;

    for draft in &typed.edges {
        let edge = IdentityEdge::build(
            &scope.store_id,
            profile_id.clone(),
            draft.relation,
            draft.from_ref.clone(),
            draft.to_ref.clone(),
            &draft.evidence_event_ids,
            draft.confidence.unwrap_or(DEFAULT_EDGE_CONFIDENCE),
            draft.metadata.as_ref(),
            scope.now,
        )?;
        edge_ids.push(edge.id.as_str().to_string());
        match bucket.upsert_identity_edge(edge)? {
            UpsertAction::Created => created += 1,
            UpsertAction::Updated => updated += 1,
            UpsertAction::Noop => noops += 1,
        }
    }

    let action = if created > 0 {
        UpsertAction::Created
    } else if updated > 0 {
        UpsertAction::Updated
    } else {
        UpsertAction::Noop
    };
    if action.is_mutation() {
        bucket.counters.record_mutation("identity_graph_update");
    }
    let observability = MemoryEngine::observability(&bucket, created + updated, 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = IdentityGraphUpdateResponse {
        meta: ResponseMeta::new(
            "identity_graph_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        edge_ids,
        created,
        updated,
        noops,
    };
    to_value(&response)
}
