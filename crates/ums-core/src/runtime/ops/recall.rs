// crates/ums-core/src/runtime/ops/recall.rs
// ============================================================================
// Module: Recall Handlers
// Description: Bounded recall packs (`context`) and playbook export.
// Purpose: Serve evidence-backed, budgeted recall from one bucket.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Recall ranks episodes, rules, and anti-patterns against a query and
//! assembles a pack bounded by `maxItems` and a token budget. When the
//! pack exceeds its budget, sections are popped in the fixed order
//! `evidencePointers -> antiPatterns -> topRules -> items` until it
//! fits; a budget that cannot be satisfied fails with `PAYLOAD_LIMIT`.
//! Unsafe-flagged content never appears unless `includeUnsafe` is set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::hashing::canonical_byte_len;
use crate::core::identifiers::StoreId;
use crate::core::rules::RuleStatus;
use crate::core::time::MILLIS_PER_DAY;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::guardrails::check_isolation;
use crate::runtime::guardrails::estimated_tokens;
use crate::runtime::index::DocKind;
use crate::runtime::index::documents_for_bucket;
use crate::runtime::index::search;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::ContextRequest;
use crate::runtime::requests::ExportRequest;
use crate::runtime::responses::AntiPatternView;
use crate::runtime::responses::ContextResponse;
use crate::runtime::responses::ExportResponse;
use crate::runtime::responses::Playbook;
use crate::runtime::responses::RecallMatch;
use crate::runtime::responses::RecallPack;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::responses::RuleView;
use crate::runtime::state::ProfileState;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: View Builders
// ============================================================================

/// Builds recall views of the top active rules.
fn rule_views(bucket: &ProfileState, limit: usize) -> Vec<RuleView> {
    bucket
        .list_rules(Some(limit))
        .into_iter()
        .filter(|rule| rule.status == RuleStatus::Active)
        .map(|rule| RuleView {
            id: rule.id.as_str().to_string(),
            statement: rule.statement.clone(),
            confidence: rule.confidence,
            evidence_episode_ids: rule.evidence_episode_ids.clone(),
            updated_at: rule.updated_at,
        })
        .collect()
}

/// Builds recall views of anti-patterns.
fn anti_views(bucket: &ProfileState, limit: usize) -> Vec<AntiPatternView> {
    bucket
        .list_anti_patterns(Some(limit))
        .into_iter()
        .map(|anti| AntiPatternView {
            id: anti.id.as_str().to_string(),
            statement: anti.statement.clone(),
            confidence: anti.confidence,
            evidence_episode_ids: anti.evidence_episode_ids.clone(),
            created_at: anti.created_at,
        })
        .collect()
}

/// Collects the sorted evidence union of rule and anti-pattern views.
fn evidence_union(rules: &[RuleView], antis: &[AntiPatternView]) -> Vec<String> {
    let mut pointers: Vec<String> = rules
        .iter()
        .flat_map(|rule| rule.evidence_episode_ids.iter().cloned())
        .chain(antis.iter().flat_map(|anti| anti.evidence_episode_ids.iter().cloned()))
        .collect();
    pointers.sort();
    pointers.dedup();
    pointers
}

/// Emits freshness warnings for rules past the validation horizon.
fn freshness_warnings(
    bucket: &ProfileState,
    freshness_days: i64,
    now_millis: i64,
) -> Vec<String> {
    let horizon = freshness_days * MILLIS_PER_DAY;
    let mut warnings = Vec::new();
    for rule in bucket.list_rules(None) {
        if rule.status != RuleStatus::Active {
            continue;
        }
        let reference = rule.last_validated_at.unwrap_or(rule.created_at);
        if now_millis - reference.unix_millis() > horizon {
            warnings.push(format!(
                "rule {} not validated since {}",
                rule.id,
                reference.to_rfc3339()
            ));
        }
    }
    warnings.sort();
    warnings
}

/// Emits conflict notes for rules with a matching `Avoid:` anti-pattern.
fn conflict_notes(bucket: &ProfileState) -> Vec<String> {
    let mut notes = Vec::new();
    for rule in bucket.rules.values() {
        if rule.status != RuleStatus::Active {
            continue;
        }
        let inverse = format!("Avoid: {}", rule.statement);
        for anti in bucket.anti_patterns.values() {
            if anti.statement == inverse {
                notes.push(format!("rule {} conflicts with anti-pattern {}", rule.id, anti.id));
            }
        }
    }
    notes.sort();
    notes
}

// ============================================================================
// SECTION: Budget Enforcement
// ============================================================================

/// Pops pack sections in the fixed truncation order until the pack fits
/// its byte budget.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when an empty pack still
/// exceeds the budget.
fn fit_pack_to_budget(
    pack: &mut RecallPack,
    max_bytes: usize,
    truncated: &mut bool,
) -> Result<usize, EngineError> {
    loop {
        let actual = canonical_byte_len(pack)?;
        if actual <= max_bytes {
            return Ok(actual);
        }
        *truncated = true;
        if pack.evidence_pointers.pop().is_some() {
            continue;
        }
        if pack.anti_patterns.pop().is_some() {
            continue;
        }
        if pack.top_rules.pop().is_some() {
            continue;
        }
        if let Some(dropped) = pack.items.pop() {
            pack.matches.retain(|entry| entry.id != dropped.id);
            continue;
        }
        if pack.freshness.pop().is_some() || pack.conflicts.pop().is_some() {
            continue;
        }
        return Err(EngineError::payload_limit(format!(
            "recall pack cannot fit byte budget: {actual} > {max_bytes}"
        )));
    }
}

/// Pops playbook sections until the playbook fits its byte budget.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when an empty playbook still
/// exceeds the budget.
fn fit_playbook_to_budget(
    playbook: &mut Playbook,
    max_bytes: usize,
    truncated: &mut bool,
) -> Result<usize, EngineError> {
    loop {
        let actual = canonical_byte_len(playbook)?;
        if actual <= max_bytes {
            return Ok(actual);
        }
        *truncated = true;
        if playbook.evidence_pointers.pop().is_some() {
            continue;
        }
        if playbook.anti_patterns.pop().is_some() {
            continue;
        }
        if playbook.top_rules.pop().is_some() {
            continue;
        }
        return Err(EngineError::payload_limit(format!(
            "playbook cannot fit byte budget: {actual} > {max_bytes}"
        )));
    }
}

// ============================================================================
// SECTION: Context Handler
// ============================================================================

/// Handles the `context` operation.
///
/// # Errors
///
/// Returns [`EngineError::IsolationViolation`] for unauthorized
/// cross-store reads and [`EngineError::PayloadLimit`] when the pack
/// cannot fit its budget.
pub(crate) fn context(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ContextRequest = parse(request)?;

    let target_store = typed
        .target_store_id
        .as_ref()
        .map_or_else(|| scope.store_id.clone(), |raw| StoreId::new(raw.clone()));
    check_isolation(
        &scope.store_id,
        &target_store,
        &typed.allow_stores,
        &engine.config.guardrails,
    )?;

    let empty = ProfileState::default();
    let bucket = engine
        .state
        .bucket(&target_store, &scope.profile)
        .unwrap_or(&empty);

    let include_unsafe = typed
        .include_unsafe
        .unwrap_or(engine.config.guardrails.include_unsafe);
    let mut documents = documents_for_bucket(bucket);
    if !include_unsafe {
        documents.retain(|doc| !doc.unsafe_instruction);
    }

    let max_items = typed.max_items.unwrap_or(engine.config.guardrails.max_recall_items);
    let token_budget = typed
        .token_budget
        .unwrap_or(engine.config.guardrails.default_token_budget);

    let ranked = search(documents, &typed.query, &engine.config.index_seed);
    let mut truncated = ranked.len() > max_items;
    let items: Vec<RecallMatch> = ranked
        .into_iter()
        .take(max_items)
        .map(|hit| RecallMatch {
            id: hit.document.id.clone(),
            kind: hit.document.kind.as_str().to_string(),
            score: hit.score,
            snippet: hit.document.text.clone(),
            created_at: hit.document.created_at,
        })
        .collect();
    let matches: Vec<RecallMatch> = items
        .iter()
        .filter(|item| item.kind == DocKind::Episode.as_str())
        .cloned()
        .collect();

    let top_rules = rule_views(bucket, max_items);
    let anti_patterns = anti_views(bucket, max_items);
    let evidence_pointers = evidence_union(&top_rules, &anti_patterns);
    let freshness = freshness_warnings(bucket, engine.config.freshness_days, scope.now.unix_millis());
    let conflicts = conflict_notes(bucket);

    let mut pack = RecallPack {
        matches,
        items,
        top_rules,
        anti_patterns,
        evidence_pointers,
        freshness,
        conflicts,
    };
    let actual = fit_pack_to_budget(&mut pack, token_budget * 4, &mut truncated)?;

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = ContextResponse {
        meta: ResponseMeta::new(
            "context",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        query: typed.query,
        pack,
        truncated,
        estimated_tokens: estimated_tokens(actual),
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Export Handler
// ============================================================================

/// Handles the `export` operation.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when the playbook cannot fit
/// its budget.
pub(crate) fn export(
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

    let top_rules = rule_views(bucket, max_items);
    let anti_patterns = anti_views(bucket, max_items);
    let evidence_pointers = evidence_union(&top_rules, &anti_patterns);

    let mut counts = std::collections::BTreeMap::new();
    counts.insert("episodes".to_string(), u64::try_from(bucket.episodes.len()).unwrap_or(u64::MAX));
    counts.insert("rules".to_string(), u64::try_from(bucket.rules.len()).unwrap_or(u64::MAX));
    counts.insert(
        "antiPatterns".to_string(),
        u64::try_from(bucket.anti_patterns.len()).unwrap_or(u64::MAX),
    );
    counts.insert(
        "working".to_string(),
        u64::try_from(bucket.working.len()).unwrap_or(u64::MAX),
    );

    let mut truncated = false;
    let mut playbook = Playbook {
        top_rules,
        anti_patterns,
        evidence_pointers,
        counts,
    };
    let actual = fit_playbook_to_budget(&mut playbook, token_budget * 4, &mut truncated)?;

    let observability = MemoryEngine::observability(bucket, 0, 0, 0);
    let response = ExportResponse {
        meta: ResponseMeta::new(
            "export",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            UpsertAction::Noop,
            &scope.request_digest,
            observability,
        ),
        playbook,
        truncated,
        estimated_tokens: estimated_tokens(actual),
    };
    to_value(&response)
}
