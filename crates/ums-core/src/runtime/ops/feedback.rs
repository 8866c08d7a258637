// crates/ums-core/src/runtime/ops/feedback.rs
// ============================================================================
// Module: Feedback Handlers
// Description: Rule reinforcement signals and task outcome recording.
// Purpose: Drive rule confidence from explicit and implicit signals.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Both handlers record a fingerprinted signal episode before touching
//! any rule: the episode's content-addressed identifier doubles as the
//! replay marker, so resubmitting the same signal is a noop and never
//! double-reinforces. `outcome` additionally maps failures onto implicit
//! misconception signals (`mappingSource = outcome_failure`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::core::episode::Episode;
use crate::core::episode::EpisodeDraft;
use crate::core::errors::EngineError;
use crate::core::identifiers::RuleId;
use crate::core::rules::RuleStatus;
use crate::core::signals::SignalKind;
use crate::core::text::sorted_unique;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::models::invert;
use crate::runtime::models::reinforce;
use crate::runtime::ops::misconception::SignalInput;
use crate::runtime::ops::misconception::apply_signal;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::FeedbackRequest;
use crate::runtime::requests::OutcomeRequest;
use crate::runtime::responses::FeedbackResponse;
use crate::runtime::responses::OutcomeResponse;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Feedback Handler
// ============================================================================

/// Resolves the helpful/harmful unit counts from a feedback request.
fn resolve_signal_counts(typed: &FeedbackRequest) -> Result<(u64, u64), EngineError> {
    let mut helpful = typed.helpful_count.unwrap_or(0);
    let mut harmful = typed.harmful_count.unwrap_or(0);
    match typed.signal.as_deref() {
        Some("helpful") => helpful = helpful.max(1),
        Some("harmful") => harmful = harmful.max(1),
        Some(other) => {
            return Err(EngineError::validation(format!(
                "signal must be helpful or harmful, got {other:?}"
            )));
        }
        None => {}
    }
    if helpful == 0 && harmful == 0 && typed.invert != Some(true) {
        return Err(EngineError::validation(
            "feedback requires a signal, explicit counts, or invert",
        ));
    }
    Ok((helpful, harmful))
}

/// Handles the `feedback` operation.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] when the target rule does not
/// exist in the bucket.
pub(crate) fn feedback(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: FeedbackRequest = parse(request)?;
    let (helpful, harmful) = resolve_signal_counts(&typed)?;

    let mut bucket = engine.stage_bucket(scope);
    let rule_id = RuleId::new(typed.rule_id.clone());
    let rule = bucket
        .rules
        .get(&rule_id)
        .cloned()
        .ok_or_else(|| EngineError::not_found(format!("rule {} not found", typed.rule_id)))?;

    // The fingerprinted signal episode is the replay marker: appending
    // the same signal twice is a duplicate and the rule stays put.
    let signal_episode = Episode::build(
        EpisodeDraft {
            id: None,
            episode_type: "feedback_signal".to_string(),
            source: "feedback".to_string(),
            content: format!(
                "feedback for rule {}: helpful={helpful} harmful={harmful} invert={}",
                rule_id,
                typed.invert.unwrap_or(false)
            ),
            payload: Some(json!({
                "ruleId": rule_id.as_str(),
                "helpful": helpful,
                "harmful": harmful,
                "invert": typed.invert.unwrap_or(false),
                "reason": typed.reason.clone(),
            })),
            metadata: None,
            unsafe_instruction: false,
            redactions: 0,
            created_at: None,
        },
        &scope.store_id,
        scope.now,
    )?;
    let signal_episode_id = signal_episode.id.as_str().to_string();
    let episode_action = bucket.append_episode(signal_episode)?;

    let previous_confidence = rule.confidence;
    let mut action = episode_action;
    let mut anti_pattern_id = None;
    let (confidence, status) = if episode_action == UpsertAction::Noop {
        // Replayed signal: report current state without reapplying.
        (rule.confidence, rule.status)
    } else {
        let reinforced = reinforce(&rule, helpful, harmful, scope.now);
        let confidence = reinforced.confidence;
        let status = reinforced.status;
        action = action.combine(bucket.replace_rule(reinforced.clone())?);
        if typed.invert == Some(true) {
            let reason = typed.reason.clone().unwrap_or_else(|| "feedback".to_string());
            let anti = invert(&reinforced, &reason, scope.now)?;
            anti_pattern_id = Some(anti.id.as_str().to_string());
            action = action.combine(bucket.upsert_anti_pattern(anti)?);
        }
        (confidence, status)
    };

    if action.is_mutation() {
        bucket.counters.record_mutation("feedback");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = FeedbackResponse {
        meta: ResponseMeta::new(
            "feedback",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        rule_id: rule_id.as_str().to_string(),
        previous_confidence,
        confidence,
        status: match status {
            RuleStatus::Active => "active".to_string(),
            RuleStatus::Tombstoned => "tombstoned".to_string(),
        },
        anti_pattern_id,
        signal_episode_id,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Outcome Handler
// ============================================================================

/// Handles the `outcome` operation.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for an unknown status value.
pub(crate) fn outcome(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: OutcomeRequest = parse(request)?;
    let success = match typed.status.as_str() {
        "success" => true,
        "failure" => false,
        other => {
            return Err(EngineError::validation(format!(
                "status must be success or failure, got {other:?}"
            )));
        }
    };
    if typed.task_id.trim().is_empty() {
        return Err(EngineError::validation("taskId must not be empty"));
    }

    let mut bucket = engine.stage_bucket(scope);
    let used_rule_ids = sorted_unique(&typed.used_rule_ids);

    let mut content = format!("task {} finished with {}", typed.task_id, typed.status);
    if let Some(notes) = &typed.notes {
        content.push_str(": ");
        content.push_str(notes);
    }
    let outcome_episode = Episode::build(
        EpisodeDraft {
            id: None,
            episode_type: "task_outcome".to_string(),
            source: "outcome".to_string(),
            content,
            payload: Some(json!({
                "taskId": typed.task_id,
                "status": typed.status,
                "usedRuleIds": used_rule_ids,
            })),
            metadata: None,
            unsafe_instruction: false,
            redactions: 0,
            created_at: None,
        },
        &scope.store_id,
        scope.now,
    )?;
    let episode_id = outcome_episode.id.as_str().to_string();
    let episode_action = bucket.append_episode(outcome_episode)?;

    let mut action = episode_action;
    let mut reinforced_rule_ids = Vec::new();
    let mut misconception_id = None;
    let mut anti_pattern_ids = Vec::new();

    if episode_action != UpsertAction::Noop {
        for raw_id in &used_rule_ids {
            let rule_id = RuleId::new(raw_id.clone());
            let Some(rule) = bucket.rules.get(&rule_id).cloned() else {
                continue;
            };
            let reinforced = if success {
                reinforce(&rule, 1, 0, scope.now)
            } else {
                reinforce(&rule, 0, 1, scope.now)
            };
            action = action.combine(bucket.replace_rule(reinforced)?);
            reinforced_rule_ids.push(rule_id.as_str().to_string());
        }

        if !success
            && let Some(key) = &typed.misconception_key
        {
            let evidence = vec![episode_id.clone()];
            let sources = vec![episode_id.clone()];
            let effect = apply_signal(
                &mut bucket,
                &scope.store_id,
                &SignalInput {
                    profile_id: scope.profile.as_str(),
                    misconception_key: key,
                    signal: SignalKind::Harmful,
                    severity: typed.severity.unwrap_or(0.0),
                    status: None,
                    statement: None,
                    evidence_event_ids: &evidence,
                    source_signal_ids: &sources,
                    metadata: Some(json!({ "mappingSource": "outcome_failure" })),
                },
                scope.now,
            )?;
            misconception_id = Some(effect.misconception.id.as_str().to_string());
            anti_pattern_ids = effect.escalated_anti_pattern_ids;
            action = action.combine(effect.action);
        }
    }

    if action.is_mutation() {
        bucket.counters.record_mutation("outcome");
    }
    let observability =
        MemoryEngine::observability(&bucket, u64::from(action.is_mutation()), 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = OutcomeResponse {
        meta: ResponseMeta::new(
            "outcome",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        task_id: typed.task_id,
        episode_id,
        reinforced_rule_ids,
        misconception_id,
        anti_pattern_ids,
    };
    to_value(&response)
}
