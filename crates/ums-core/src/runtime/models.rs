// crates/ums-core/src/runtime/models.rs
// ============================================================================
// Module: UMS Memory Models
// Description: Diary/digest construction, rule reinforcement, inversion, harm decay.
// Purpose: Implement the cognitive-layer formulas as pure deterministic functions.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Memory models never touch state directly: each function maps entities
//! to new entities. Reinforcement moves confidence by `+0.08` per helpful
//! and `-0.18` per harmful signal and tombstones at `<= 0.05`; inversion
//! produces an `Avoid:` anti-pattern; misconception harm decays
//! confidence by count bands with a floor of `0.05`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::core::episode::Episode;
use crate::core::errors::EngineError;
use crate::core::identifiers::StoreId;
use crate::core::rules::AntiPattern;
use crate::core::rules::ProceduralRule;
use crate::core::rules::RuleStatus;
use crate::core::rules::clamp_confidence;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;
use crate::core::working::WorkingEntry;
use crate::core::working::WorkingKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Confidence delta per helpful reinforcement signal.
pub const HELPFUL_DELTA: f64 = 0.08;
/// Confidence delta per harmful reinforcement signal.
pub const HARMFUL_DELTA: f64 = 0.18;
/// Confidence at or below which a rule is tombstoned.
pub const TOMBSTONE_THRESHOLD: f64 = 0.05;
/// Minimum confidence for an inverted anti-pattern.
pub const INVERSION_CONFIDENCE_FLOOR: f64 = 0.2;
/// Harm escalation thresholds that emit anti-pattern artifacts.
pub const HARM_ESCALATION_THRESHOLDS: [u64; 3] = [2, 3, 5];
/// Confidence floor applied after harm decay.
pub const HARM_CONFIDENCE_FLOOR: f64 = 0.05;
/// Maximum diary content length in characters.
const DIARY_MAX_CHARS: usize = 1_024;
/// Maximum characters taken from one episode into the diary.
const DIARY_SNIPPET_CHARS: usize = 60;

// ============================================================================
// SECTION: Diary and Digest
// ============================================================================

/// Builds a diary entry summarizing the most recent episodes.
///
/// Episodes are taken in `(createdAt, id)` order; the newest `window`
/// entries contribute a bounded snippet each.
///
/// # Errors
///
/// Returns [`EngineError`] when no episodes exist to summarize.
pub fn build_diary(
    store_id: &StoreId,
    episodes: &[&Episode],
    window: usize,
    now: Timestamp,
) -> Result<WorkingEntry, EngineError> {
    if episodes.is_empty() {
        return Err(EngineError::validation("diary requires at least one episode"));
    }
    let start = episodes.len().saturating_sub(window);
    let recent = episodes.get(start ..).unwrap_or_default();

    let mut snippets = Vec::with_capacity(recent.len());
    let mut evidence = Vec::with_capacity(recent.len());
    for episode in recent {
        let snippet: String = episode.content.chars().take(DIARY_SNIPPET_CHARS).collect();
        snippets.push(format!("[{}] {snippet}", episode.episode_type));
        evidence.push(episode.id.as_str().to_string());
    }
    let mut content = format!("{} episode(s): {}", recent.len(), snippets.join(" | "));
    if content.chars().count() > DIARY_MAX_CHARS {
        content = content.chars().take(DIARY_MAX_CHARS).collect();
    }
    WorkingEntry::build(store_id, WorkingKind::Diary, content, &evidence, now)
}

/// Builds a digest entry recording episode count and distinct types.
///
/// # Errors
///
/// Returns [`EngineError`] when no episodes exist to digest.
pub fn build_digest(
    store_id: &StoreId,
    episodes: &[&Episode],
    now: Timestamp,
) -> Result<WorkingEntry, EngineError> {
    if episodes.is_empty() {
        return Err(EngineError::validation("digest requires at least one episode"));
    }
    let types: Vec<String> = episodes
        .iter()
        .map(|episode| episode.episode_type.clone())
        .collect();
    let types = sorted_unique(&types);
    let evidence: Vec<String> = episodes
        .iter()
        .map(|episode| episode.id.as_str().to_string())
        .collect();
    let content = format!("{} episode(s); types: {}", episodes.len(), types.join(", "));
    WorkingEntry::build(store_id, WorkingKind::Digest, content, &evidence, now)
}

// ============================================================================
// SECTION: Reinforcement
// ============================================================================

/// Applies reinforcement signals to a rule.
///
/// `confidence <- clamp(confidence + 0.08*helpful - 0.18*harmful, 0, 1)`;
/// a result at or below the tombstone threshold retires the rule.
#[must_use]
pub fn reinforce(
    rule: &ProceduralRule,
    helpful: u64,
    harmful: u64,
    now: Timestamp,
) -> ProceduralRule {
    let delta = HELPFUL_DELTA * (helpful as f64) - HARMFUL_DELTA * (harmful as f64);
    let confidence = clamp_confidence(rule.confidence + delta);
    let mut updated = rule.clone();
    updated.confidence = confidence;
    updated.helpful_count = rule.helpful_count.saturating_add(helpful);
    updated.harmful_count = rule.harmful_count.saturating_add(harmful);
    updated.updated_at = now;
    updated.last_validated_at = Some(now);
    if confidence <= TOMBSTONE_THRESHOLD && updated.status == RuleStatus::Active {
        updated = tombstone(&updated, "confidence_depleted", now);
    }
    updated
}

/// Tombstones a rule, recording the reason in metadata.
#[must_use]
pub fn tombstone(rule: &ProceduralRule, reason: &str, now: Timestamp) -> ProceduralRule {
    let mut updated = rule.clone();
    updated.status = RuleStatus::Tombstoned;
    updated.updated_at = now;
    let mut metadata = updated
        .metadata
        .as_ref()
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    metadata.insert("tombstoneReason".to_string(), json!(reason));
    metadata.insert("tombstonedAt".to_string(), json!(now.to_rfc3339()));
    updated.metadata = Some(Value::Object(metadata));
    updated
}

/// Inverts a rule into an anti-pattern, preserving evidence.
///
/// # Errors
///
/// Returns [`EngineError`] when the anti-pattern cannot be constructed.
pub fn invert(
    rule: &ProceduralRule,
    reason: &str,
    now: Timestamp,
) -> Result<AntiPattern, EngineError> {
    let statement = format!("Avoid: {}", rule.statement);
    let confidence = rule.confidence.max(INVERSION_CONFIDENCE_FLOOR);
    AntiPattern::build(
        &rule.store_id,
        statement,
        confidence,
        &rule.evidence_episode_ids,
        Some(rule.id.clone()),
        None,
        None,
        Some(json!({ "inversionReason": reason })),
        now,
    )
}

// ============================================================================
// SECTION: Harm Escalation
// ============================================================================

/// Returns the confidence decay band for a harmful signal count.
#[must_use]
pub const fn harm_decay_band(harmful_signal_count: u64) -> f64 {
    match harmful_signal_count {
        0 => 0.0,
        1 => 0.18,
        2 => 0.24,
        3 | 4 => 0.32,
        _ => 0.42,
    }
}

/// Applies harm decay to a misconception confidence.
///
/// Decay magnitude is `band(count) + severity * 0.08`, floored at
/// [`HARM_CONFIDENCE_FLOOR`].
#[must_use]
pub fn harm_adjusted_confidence(confidence: f64, harmful_signal_count: u64, severity: f64) -> f64 {
    let decay = harm_decay_band(harmful_signal_count) + severity.clamp(0.0, 1.0) * 0.08;
    clamp_confidence((confidence - decay).max(HARM_CONFIDENCE_FLOOR))
}

/// Returns the escalation thresholds newly crossed by a count change.
#[must_use]
pub fn thresholds_crossed(previous_count: u64, new_count: u64) -> Vec<u64> {
    HARM_ESCALATION_THRESHOLDS
        .iter()
        .copied()
        .filter(|threshold| previous_count < *threshold && new_count >= *threshold)
        .collect()
}
