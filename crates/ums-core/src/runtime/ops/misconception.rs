// crates/ums-core/src/runtime/ops/misconception.rs
// ============================================================================
// Module: Misconception Handler
// Description: Signal-driven misconception upserts and harm escalation.
// Purpose: Track misconceptions per profile and emit escalation artifacts.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Every update carries a signal (`harmful`, `correction`, `observed`)
//! and evidence. Harmful signals decay confidence through the count
//! bands and, at counts 2, 3, and 5, emit anti-pattern artifacts keyed
//! by `(misconceptionId, threshold)` so each threshold fires exactly
//! once. The `outcome` handler reuses [`apply_signal`] for implicit
//! failure signals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::StoreId;
use crate::core::policy::has_policy_exception;
use crate::core::rules::AntiPattern;
use crate::core::rules::clamp_confidence;
use crate::core::signals::Misconception;
use crate::core::signals::MisconceptionStatus;
use crate::core::signals::SignalKind;
use crate::core::text::union_sorted;
use crate::core::time::Timestamp;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::models::harm_adjusted_confidence;
use crate::runtime::models::thresholds_crossed;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::MisconceptionUpdateRequest;
use crate::runtime::responses::MisconceptionUpdateResponse;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::state::ProfileState;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Initial confidence for a first-seen misconception.
const INITIAL_CONFIDENCE: f64 = 0.5;
/// Confidence gained per correction signal.
const CORRECTION_DELTA: f64 = 0.15;
/// Base confidence for escalation artifacts before the threshold step.
const ESCALATION_BASE_CONFIDENCE: f64 = 0.2;
/// Confidence step per escalation threshold unit.
const ESCALATION_STEP: f64 = 0.1;

// ============================================================================
// SECTION: Signal Application
// ============================================================================

/// Inputs for one misconception signal.
pub(crate) struct SignalInput<'a> {
    /// Profile scope for the misconception.
    pub profile_id: &'a str,
    /// Misconception semantic key.
    pub misconception_key: &'a str,
    /// Signal kind.
    pub signal: SignalKind,
    /// Harm severity in `[0, 1]`.
    pub severity: f64,
    /// Requested status transition, when any.
    pub status: Option<MisconceptionStatus>,
    /// Statement for escalation artifacts; falls back to the key.
    pub statement: Option<&'a str>,
    /// Evidence event identifiers for this signal.
    pub evidence_event_ids: &'a [String],
    /// Source signal identifiers.
    pub source_signal_ids: &'a [String],
    /// Caller metadata.
    pub metadata: Option<Value>,
}

/// Result of applying one signal to a bucket.
pub(crate) struct SignalEffect {
    /// The misconception after the upsert.
    pub misconception: Misconception,
    /// Anti-pattern artifacts emitted by crossed thresholds.
    pub escalated_anti_pattern_ids: Vec<String>,
    /// Aggregate action across the misconception and artifacts.
    pub action: UpsertAction,
}

/// Applies a misconception signal to a staged bucket.
///
/// # Errors
///
/// Returns [`EngineError::EvidenceRequired`] when the signal carries no
/// evidence and no policy exception, and [`EngineError::Validation`]
/// for illegal status transitions.
pub(crate) fn apply_signal(
    bucket: &mut ProfileState,
    store_id: &StoreId,
    input: &SignalInput<'_>,
    now: Timestamp,
) -> Result<SignalEffect, EngineError> {
    if input.evidence_event_ids.is_empty() && !has_policy_exception(input.metadata.as_ref()) {
        return Err(EngineError::evidence_required(
            "misconception_update requires at least one evidenceEventIds entry",
        ));
    }

    // Locate any existing record through a probe build sharing the
    // semantic key; the probe never enters the bucket.
    let probe = Misconception::build(
        store_id,
        input.profile_id,
        input.misconception_key,
        MisconceptionStatus::Active,
        INITIAL_CONFIDENCE,
        0,
        0,
        input.evidence_event_ids,
        input.source_signal_ids,
        input.metadata.clone(),
        now,
        now,
        now,
    )?;
    let existing = bucket.misconceptions.get(&probe.id).cloned();

    // Replay safety: a signal whose source identifiers were all seen
    // before is the same signal again, not a new one.
    if let Some(existing_record) = &existing {
        let replayed = !input.source_signal_ids.is_empty()
            && input
                .source_signal_ids
                .iter()
                .all(|source| existing_record.source_signal_ids.contains(source));
        if replayed {
            return Ok(SignalEffect {
                misconception: existing_record.clone(),
                escalated_anti_pattern_ids: Vec::new(),
                action: UpsertAction::Noop,
            });
        }
    }

    let previous_harm = existing.as_ref().map_or(0, |m| m.harmful_signal_count);
    let previous_correction = existing.as_ref().map_or(0, |m| m.correction_signal_count);
    let base_confidence = existing.as_ref().map_or(INITIAL_CONFIDENCE, |m| m.confidence);
    let created_at = existing.as_ref().map_or(now, |m| m.created_at);

    let (harmful_count, correction_count, confidence) = match input.signal {
        SignalKind::Harmful => {
            let next = previous_harm.saturating_add(1);
            (
                next,
                previous_correction,
                harm_adjusted_confidence(base_confidence, next, input.severity),
            )
        }
        SignalKind::Correction => (
            previous_harm,
            previous_correction.saturating_add(1),
            clamp_confidence(base_confidence + CORRECTION_DELTA),
        ),
        SignalKind::Observed => (previous_harm, previous_correction, base_confidence),
    };

    let status = match input.status {
        Some(MisconceptionStatus::Resolved) => {
            if correction_count == 0 {
                return Err(EngineError::validation(
                    "resolved status requires at least one correction signal",
                ));
            }
            MisconceptionStatus::Resolved
        }
        Some(requested) => requested,
        None => existing.as_ref().map_or(MisconceptionStatus::Active, |m| m.status),
    };

    let evidence = existing.as_ref().map_or_else(
        || input.evidence_event_ids.to_vec(),
        |m| union_sorted(&m.evidence_episode_ids, input.evidence_event_ids),
    );
    let sources = existing.as_ref().map_or_else(
        || input.source_signal_ids.to_vec(),
        |m| union_sorted(&m.source_signal_ids, input.source_signal_ids),
    );

    let incoming = Misconception::build(
        store_id,
        input.profile_id,
        input.misconception_key,
        status,
        confidence,
        harmful_count,
        correction_count,
        &evidence,
        &sources,
        input.metadata.clone(),
        created_at,
        now,
        now,
    )?;
    let misconception_id = incoming.id.clone();
    let mut action = bucket.upsert_misconception(incoming)?;

    let mut escalated = Vec::new();
    if input.signal == SignalKind::Harmful {
        let statement_seed = input.statement.unwrap_or(input.misconception_key);
        for threshold in thresholds_crossed(previous_harm, harmful_count) {
            let artifact = AntiPattern::build(
                store_id,
                format!("Avoid: {statement_seed}"),
                clamp_confidence(ESCALATION_BASE_CONFIDENCE + ESCALATION_STEP * (threshold as f64)),
                &evidence,
                None,
                Some(misconception_id.clone()),
                Some(threshold),
                None,
                now,
            )?;
            let artifact_id = artifact.id.as_str().to_string();
            action = action.combine(bucket.upsert_anti_pattern(artifact)?);
            escalated.push(artifact_id);
        }
    }

    let merged = bucket
        .misconceptions
        .get(&misconception_id)
        .cloned()
        .ok_or_else(|| EngineError::contract("misconception vanished during upsert"))?;
    Ok(SignalEffect {
        misconception: merged,
        escalated_anti_pattern_ids: escalated,
        action,
    })
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handles the `misconception_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::EvidenceRequired`] for missing evidence and
/// [`EngineError::Validation`] for illegal transitions.
pub(crate) fn misconception_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: MisconceptionUpdateRequest = parse(request)?;
    let profile_id = typed
        .profile_id
        .clone()
        .unwrap_or_else(|| scope.profile.as_str().to_string());

    // Requests without explicit source identifiers key the signal on the
    // request digest, so replaying the same request is a noop.
    let sources = if typed.source_signal_ids.is_empty() {
        let short = scope
            .request_digest
            .get(.. 16)
            .unwrap_or(scope.request_digest.as_str());
        vec![format!("sig_{short}")]
    } else {
        typed.source_signal_ids.clone()
    };

    let mut bucket = engine.stage_bucket(scope);
    let effect = apply_signal(
        &mut bucket,
        &scope.store_id,
        &SignalInput {
            profile_id: &profile_id,
            misconception_key: &typed.misconception_key,
            signal: typed.signal.unwrap_or(SignalKind::Observed),
            severity: typed.severity.unwrap_or(0.0),
            status: typed.status,
            statement: typed.statement.as_deref(),
            evidence_event_ids: &typed.evidence_event_ids,
            source_signal_ids: &sources,
            metadata: typed.metadata.clone(),
        },
        scope.now,
    )?;

    if effect.action.is_mutation() {
        bucket.counters.record_mutation("misconception_update");
    }
    let mutations = u64::from(effect.action.is_mutation());
    let observability = MemoryEngine::observability(&bucket, mutations, 0, 0);
    if effect.action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let status = match effect.misconception.status {
        MisconceptionStatus::Active => "active",
        MisconceptionStatus::Resolved => "resolved",
        MisconceptionStatus::Suppressed => "suppressed",
    };
    let response = MisconceptionUpdateResponse {
        meta: ResponseMeta::new(
            "misconception_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            effect.action,
            &scope.request_digest,
            observability,
        ),
        misconception_id: effect.misconception.id.as_str().to_string(),
        status: status.to_string(),
        confidence: effect.misconception.confidence,
        harmful_signal_count: effect.misconception.harmful_signal_count,
        correction_signal_count: effect.misconception.correction_signal_count,
        escalated_anti_pattern_ids: effect.escalated_anti_pattern_ids,
    };
    to_value(&response)
}
