// crates/ums-core/src/runtime/ops/distill.rs
// ============================================================================
// Module: Distillation Handlers
// Description: Candidate generation, validation, and curation.
// Purpose: Distill episodes into evidence-backed procedural rules.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! `reflect` is a pure function over episodes: recurring-token clusters
//! become candidates with provisional confidence; it never writes.
//! `validate` resolves each candidate's evidence against the bucket and
//! marks contradictions. `curate` upserts validated candidates; the
//! guarded variant additionally screens statements through the unsafe
//! filter and byte budget.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::EpisodeId;
use crate::core::rules::ProceduralRule;
use crate::core::rules::RuleCandidate;
use crate::core::rules::RuleStatus;
use crate::core::rules::clamp_confidence;
use crate::core::text::tokenize;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::guardrails::ensure_statement_budget;
use crate::runtime::guardrails::is_unsafe_instruction;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::CandidatesRequest;
use crate::runtime::requests::ReflectRequest;
use crate::runtime::responses::CandidateRejection;
use crate::runtime::responses::CandidateValidation;
use crate::runtime::responses::CurateResponse;
use crate::runtime::responses::ReflectResponse;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::responses::ValidateResponse;
use crate::runtime::state::ProfileState;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Reflect
// ============================================================================

/// Minimum character length for a candidate cluster token.
const CANDIDATE_TOKEN_MIN_CHARS: usize = 4;
/// Maximum characters carried from an episode into a statement.
const CANDIDATE_SNIPPET_CHARS: usize = 120;
/// Base provisional confidence for candidates.
const CANDIDATE_BASE_CONFIDENCE: f64 = 0.3;
/// Confidence added per supporting episode.
const CANDIDATE_SUPPORT_STEP: f64 = 0.1;
/// Provisional confidence ceiling.
const CANDIDATE_CONFIDENCE_CAP: f64 = 0.6;

/// Handles the `reflect` operation. Never writes.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed request.
pub(crate) fn reflect(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ReflectRequest = parse(request)?;
    let window = typed.window.unwrap_or(engine.config.reflect.window);
    let min_support = typed.min_support.unwrap_or(engine.config.reflect.min_support).max(1);
    let max_candidates = typed
        .max_candidates
        .unwrap_or(engine.config.reflect.max_candidates);

    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&scope.store_id, &scope.profile)
        .unwrap_or(&empty);

    let all = bucket.list_episodes(Some(usize::MAX));
    let start = all.len().saturating_sub(window);
    let recent = all.get(start ..).unwrap_or_default();

    // Cluster the window by recurring tokens; unsafe episodes never
    // contribute candidate material.
    let mut clusters: BTreeMap<String, Vec<&crate::core::episode::Episode>> = BTreeMap::new();
    for episode in recent.iter().copied() {
        if episode.unsafe_instruction {
            continue;
        }
        for token in tokenize(&episode.content) {
            if token.chars().count() < CANDIDATE_TOKEN_MIN_CHARS {
                continue;
            }
            clusters.entry(token).or_default().push(episode);
        }
    }

    let mut candidates = Vec::new();
    for (token, supporters) in &clusters {
        if supporters.len() < min_support {
            continue;
        }
        let newest = supporters
            .iter()
            .max_by(|left, right| {
                left.created_at
                    .cmp(&right.created_at)
                    .then_with(|| left.id.cmp(&right.id))
            })
            .copied();
        let Some(newest) = newest else {
            continue;
        };
        let snippet: String = newest.content.chars().take(CANDIDATE_SNIPPET_CHARS).collect();
        let mut evidence: Vec<String> = supporters
            .iter()
            .map(|episode| episode.id.as_str().to_string())
            .collect();
        evidence.sort();
        evidence.dedup();
        let support = u64::try_from(supporters.len()).unwrap_or(u64::MAX);
        let confidence = clamp_confidence(
            (CANDIDATE_BASE_CONFIDENCE + CANDIDATE_SUPPORT_STEP * (supporters.len() as f64))
                .min(CANDIDATE_CONFIDENCE_CAP),
        );
        candidates.push(RuleCandidate {
            statement: format!("Recurring pattern '{token}': {snippet}"),
            confidence,
            evidence_episode_ids: evidence,
            support,
        });
    }

    candidates.sort_by(|left, right| {
        right
            .support
            .cmp(&left.support)
            .then_with(|| left.statement.cmp(&right.statement))
    });
    candidates.truncate(max_candidates);

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = ReflectResponse {
        meta: ResponseMeta::new(
            "reflect",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        candidates,
        scanned_episodes: u64::try_from(recent.len()).unwrap_or(u64::MAX),
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Validate
// ============================================================================

/// Finds existing rules or anti-patterns a candidate contradicts.
fn find_contradictions(bucket: &ProfileState, statement: &str) -> Vec<String> {
    let mut contradicts = Vec::new();
    let inverse = format!("Avoid: {statement}");
    for anti in bucket.anti_patterns.values() {
        if anti.statement == inverse {
            contradicts.push(anti.id.as_str().to_string());
        }
    }
    if let Some(positive) = statement.strip_prefix("Avoid: ") {
        for rule in bucket.rules.values() {
            if rule.status == RuleStatus::Active && rule.statement == positive {
                contradicts.push(rule.id.as_str().to_string());
            }
        }
    }
    contradicts.sort();
    contradicts
}

/// Handles the `validate` operation. Never writes.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed request.
pub(crate) fn validate(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: CandidatesRequest = parse(request)?;
    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&scope.store_id, &scope.profile)
        .unwrap_or(&empty);

    let mut results = Vec::with_capacity(typed.candidates.len());
    let mut valid_count = 0_u64;
    for candidate in &typed.candidates {
        let missing_evidence: Vec<String> = candidate
            .evidence_episode_ids
            .iter()
            .filter(|pointer| {
                !bucket.episodes.contains_key(&EpisodeId::new((*pointer).clone()))
            })
            .cloned()
            .collect();
        let contradicts = find_contradictions(bucket, &candidate.statement);
        let valid = !candidate.evidence_episode_ids.is_empty()
            && missing_evidence.is_empty()
            && contradicts.is_empty();
        if valid {
            valid_count += 1;
        }
        results.push(CandidateValidation {
            statement: candidate.statement.clone(),
            valid,
            missing_evidence,
            contradicts,
        });
    }

    let invalid_count = u64::try_from(results.len()).unwrap_or(u64::MAX) - valid_count;
    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = ValidateResponse {
        meta: ResponseMeta::new(
            "validate",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        results,
        valid_count,
        invalid_count,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Curate
// ============================================================================

/// Handles `curate` and `curate_guarded`.
///
/// The guarded variant screens each candidate through evidence
/// resolution, the unsafe-instruction filter, and the statement byte
/// budget before upserting; failures land in `rejected`.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed request.
pub(crate) fn curate(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
    guarded: bool,
) -> Result<Value, EngineError> {
    let typed: CandidatesRequest = parse(request)?;
    let operation = if guarded { "curate_guarded" } else { "curate" };

    let mut bucket = engine.stage_bucket(scope);
    let mut created = Vec::new();
    let mut updated = Vec::new();
    let mut noops = Vec::new();
    let mut rejected = Vec::new();

    for candidate in &typed.candidates {
        if guarded {
            if is_unsafe_instruction(&candidate.statement) {
                rejected.push(CandidateRejection {
                    statement: candidate.statement.clone(),
                    code: "VALIDATION_FAILED".to_string(),
                    message: "statement matches an unsafe-instruction pattern".to_string(),
                });
                continue;
            }
            if let Err(err) = ensure_statement_budget(&candidate.statement, &engine.config.guardrails)
            {
                rejected.push(CandidateRejection {
                    statement: candidate.statement.clone(),
                    code: err.code().to_string(),
                    message: err.message().to_string(),
                });
                continue;
            }
            let dangling = candidate
                .evidence_episode_ids
                .iter()
                .any(|pointer| !bucket.episodes.contains_key(&EpisodeId::new(pointer.clone())));
            if dangling {
                rejected.push(CandidateRejection {
                    statement: candidate.statement.clone(),
                    code: "NOT_FOUND".to_string(),
                    message: "an evidence pointer does not resolve in this bucket".to_string(),
                });
                continue;
            }
        }

        let rule = ProceduralRule::build(
            &scope.store_id,
            candidate.statement.clone(),
            candidate.confidence,
            &candidate.evidence_episode_ids,
            None,
            scope.now,
        );
        let mut rule = match rule {
            Ok(rule) => rule,
            Err(err) => {
                rejected.push(CandidateRejection {
                    statement: candidate.statement.clone(),
                    code: err.code().to_string(),
                    message: err.message().to_string(),
                });
                continue;
            }
        };
        rule.last_validated_at = Some(scope.now);

        let id = rule.id.as_str().to_string();
        match bucket.upsert_rule(rule, scope.now)? {
            UpsertAction::Created => created.push(id),
            UpsertAction::Updated => updated.push(id),
            UpsertAction::Noop => noops.push(id),
        }
    }

    let action = if created.is_empty() {
        if updated.is_empty() {
            UpsertAction::Noop
        } else {
            UpsertAction::Updated
        }
    } else {
        UpsertAction::Created
    };
    if action.is_mutation() {
        bucket.counters.record_mutation(operation);
    }
    let observability = MemoryEngine::observability(
        &bucket,
        u64::try_from(created.len() + updated.len()).unwrap_or(u64::MAX),
        0,
        0,
    );
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = CurateResponse {
        meta: ResponseMeta::new(
            operation,
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        created,
        updated,
        noops,
        rejected,
    };
    to_value(&response)
}
